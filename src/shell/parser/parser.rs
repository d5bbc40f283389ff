use super::ast::Segment;
use super::lexer::{Lexer, RedirectOp, Token};

/// Upper bound on the argument vector. Hitting it truncates the scan at the
/// current token and stops; it never fails the parse.
pub const MAX_ARGS: usize = 16;

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token();
        Parser {
            lexer,
            current_token,
        }
    }

    fn next_token(&mut self) {
        self.current_token = self.lexer.next_token();
    }

    /// Parses one segment. Malformed redirection syntax degrades to "no
    /// redirection"; a repeated marker overwrites the earlier target. This
    /// never reports a syntax error.
    pub fn parse_segment(&mut self) -> Segment {
        let mut segment = Segment::default();

        loop {
            match &self.current_token {
                Token::Eof => break,
                Token::Redirect(op) => {
                    let op = *op;
                    self.next_token();
                    // A dangling marker is ignored and scanning resumes at
                    // whatever followed it.
                    if let Token::Word(target) = &self.current_token {
                        match op {
                            RedirectOp::Input => segment.stdin_path = Some(target.clone()),
                            RedirectOp::Output => segment.stdout_path = Some(target.clone()),
                        }
                        self.next_token();
                    }
                }
                Token::Word(word) => {
                    if segment.argv.len() == MAX_ARGS {
                        break;
                    }
                    segment.argv.push(word.clone());
                    self.next_token();
                }
            }
        }

        segment
    }
}
