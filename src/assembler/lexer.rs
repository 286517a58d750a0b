//! Splits one source line into positioned tokens
//!
//! Whitespace separates tokens; commas and parentheses are tokens of their
//! own, so `sw x5, 0(x1)` lexes into six tokens. A trailing `:` makes a
//! label definition, a leading `.` a directive keyword. Comments start
//! with `;` and run to the end of the line.

use regex::Regex;

use super::numbers;
use super::token::{REGISTER_COUNT, Register, RegisterKind, Token, TokenKind, TokenSpan};
use super::{Error, ErrorKind};

/// Lex one source line. All lexical errors on the line are collected.
pub fn lex(line: &str, line_number: usize) -> Result<Vec<Token>, Vec<Error>> {
    let code = line.splitn(2, ';').next().unwrap_or("");
    let re = Regex::new(r"[,()]|[^\s,()]+").unwrap();

    let mut tokens = Vec::new();
    let mut errors = Vec::new();
    for mat in re.find_iter(code) {
        let span = TokenSpan::new(mat.start(), mat.end());
        match classify(mat.as_str()) {
            Ok(kind) => tokens.push(Token { kind, span }),
            Err(kind) => errors.push(Error::new(kind, span, line_number, line)),
        }
    }

    if errors.is_empty() { Ok(tokens) } else { Err(errors) }
}

fn classify(lexeme: &str) -> Result<TokenKind, ErrorKind> {
    match lexeme {
        "," => return Ok(TokenKind::Comma),
        "(" => return Ok(TokenKind::LParen),
        ")" => return Ok(TokenKind::RParen),
        _ => {}
    }

    if let Some(keyword) = lexeme.strip_prefix('.') {
        return match keyword.to_ascii_lowercase().as_str() {
            "blocks" => Ok(TokenKind::BlocksDirective),
            "warps" => Ok(TokenKind::WarpsDirective),
            _ => Err(ErrorKind::UnknownDirective(lexeme.to_string())),
        };
    }

    if let Some(name) = lexeme.strip_suffix(':') {
        return if is_identifier(name) {
            Ok(TokenKind::LabelDef(name.to_string()))
        } else {
            Err(ErrorKind::MalformedToken(lexeme.to_string()))
        };
    }

    let first = lexeme.chars().next().unwrap_or(' ');
    if first == '-' || first.is_ascii_digit() {
        return immediate(lexeme);
    }

    if let Some(register) = register(lexeme)? {
        return Ok(TokenKind::Register(register));
    }
    if let Some(mnemonic) = super::token::lookup_mnemonic(lexeme) {
        return Ok(TokenKind::Mnemonic(mnemonic));
    }
    if is_identifier(lexeme) {
        return Ok(TokenKind::LabelRef(lexeme.to_string()));
    }
    Err(ErrorKind::MalformedToken(lexeme.to_string()))
}

fn immediate(lexeme: &str) -> Result<TokenKind, ErrorKind> {
    let mut view = lexeme;
    let value = numbers::parse_int(&mut view).map_err(ErrorKind::Number)?;
    if !view.is_empty() {
        return Err(ErrorKind::MalformedToken(lexeme.to_string()));
    }
    Ok(TokenKind::Immediate(value))
}

/// `x<n>` is a vector register, `s<n>` a scalar one, `pc` the program
/// counter. Anything else (`sub`, `start`, ...) is not a register.
fn register(lexeme: &str) -> Result<Option<Register>, ErrorKind> {
    let lower = lexeme.to_ascii_lowercase();
    if lower == "pc" {
        return Ok(Some(Register::pc()));
    }
    let kind = match lower.as_bytes().first() {
        Some(b'x') => RegisterKind::Vector,
        Some(b's') => RegisterKind::Scalar,
        _ => return Ok(None),
    };
    let digits = &lower[1..];
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Ok(None);
    }
    match digits.parse::<i32>() {
        Ok(number) if (0..REGISTER_COUNT).contains(&number) => Ok(Some(Register {
            kind,
            number,
        })),
        Ok(number) => Err(ErrorKind::InvalidRegisterNumber(number)),
        Err(_) => Err(ErrorKind::MalformedToken(lexeme.to_string())),
    }
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::super::numbers::NumberError;
    use super::super::token::Mnemonic;
    use super::*;
    use crate::isa::Opcode;

    fn kinds(line: &str) -> Vec<TokenKind> {
        lex(line, 1)
            .expect("line should lex")
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn error_kinds(line: &str) -> Vec<ErrorKind> {
        lex(line, 1)
            .expect_err("line should not lex")
            .into_iter()
            .map(|error| error.kind)
            .collect()
    }

    #[test]
    fn instruction_line() {
        assert_eq!(
            kinds("addi x5, x1, 0"),
            vec![
                TokenKind::Mnemonic(Mnemonic { opcode: Opcode::Addi, scalar: false }),
                TokenKind::Register(Register::vector(5)),
                TokenKind::Comma,
                TokenKind::Register(Register::vector(1)),
                TokenKind::Comma,
                TokenKind::Immediate(0),
            ]
        );
    }

    #[test]
    fn load_line_with_parens() {
        assert_eq!(
            kinds("lw x6, 4(x1)"),
            vec![
                TokenKind::Mnemonic(Mnemonic { opcode: Opcode::Lw, scalar: false }),
                TokenKind::Register(Register::vector(6)),
                TokenKind::Comma,
                TokenKind::Immediate(4),
                TokenKind::LParen,
                TokenKind::Register(Register::vector(1)),
                TokenKind::RParen,
            ]
        );
    }

    #[test]
    fn columns_are_one_based() {
        let tokens = lex("  sw x5, 0(x1)", 1).unwrap();
        assert_eq!(tokens[0].span.column(), 3);
        assert_eq!(tokens[1].span.column(), 6);
        assert_eq!(tokens[2].span.column(), 8);
    }

    #[test]
    fn comments_are_whitespace() {
        assert_eq!(kinds("halt ; stop here"), vec![TokenKind::Mnemonic(
            Mnemonic { opcode: Opcode::Halt, scalar: false }
        )]);
        assert!(kinds("; a full-line comment").is_empty());
        assert!(kinds("").is_empty());
    }

    #[test]
    fn case_insensitive_mnemonics_and_registers() {
        assert_eq!(
            kinds("ADDI X5, S1, PC"),
            vec![
                TokenKind::Mnemonic(Mnemonic { opcode: Opcode::Addi, scalar: false }),
                TokenKind::Register(Register::vector(5)),
                TokenKind::Comma,
                TokenKind::Register(Register::scalar(1)),
                TokenKind::Comma,
                TokenKind::Register(Register::pc()),
            ]
        );
    }

    #[test]
    fn scalar_and_cross_mnemonics() {
        assert_eq!(
            kinds("s_addi sx_slt"),
            vec![
                TokenKind::Mnemonic(Mnemonic { opcode: Opcode::Addi, scalar: true }),
                TokenKind::Mnemonic(Mnemonic { opcode: Opcode::SxSlt, scalar: false }),
            ]
        );
        // no scalar spelling of halt or the cross opcodes
        assert_eq!(kinds("s_halt"), vec![TokenKind::LabelRef("s_halt".to_string())]);
    }

    #[test]
    fn labels_and_directives() {
        assert_eq!(
            kinds("loop: .blocks 2"),
            vec![
                TokenKind::LabelDef("loop".to_string()),
                TokenKind::BlocksDirective,
                TokenKind::Immediate(2),
            ]
        );
        assert_eq!(kinds("jump_target"), vec![TokenKind::LabelRef(
            "jump_target".to_string()
        )]);
    }

    #[test]
    fn register_number_out_of_range() {
        assert_eq!(error_kinds("addi x32, x1, 0"), vec![ErrorKind::InvalidRegisterNumber(32)]);
    }

    #[test]
    fn bad_number_literals() {
        assert_eq!(
            error_kinds("addi x5, x1, 0b102"),
            vec![ErrorKind::Number(NumberError::InvalidDigit { digit: '2', base: 2 })]
        );
        assert_eq!(
            error_kinds("addi x5, x1, 5zz"),
            vec![ErrorKind::MalformedToken("5zz".to_string())]
        );
    }

    #[test]
    fn unknown_directive() {
        assert_eq!(error_kinds(".org 0x200"), vec![ErrorKind::UnknownDirective(
            ".org".to_string()
        )]);
    }

    #[test]
    fn multiple_errors_collected() {
        let errors = error_kinds("addi x99, x1, 0b2");
        assert_eq!(errors.len(), 2);
    }
}
