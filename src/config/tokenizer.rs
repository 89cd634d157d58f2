//! Lexical scanner for the directive configuration language.
//!
//! Breaks raw configuration text into bare-word tokens. Whitespace
//! separates tokens, `{` and `}` are always tokens of their own, `#`
//! starts a comment that runs to the end of the line, and quotes
//! (single or double) group a token that contains whitespace. Every
//! token remembers the line it started on so later stages can report
//! positions.

/// One lexical token with its 1-based source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub line: usize,
}

/// Scan `input` into a flat token stream.
///
/// The scanner never fails; structural problems (unbalanced braces,
/// stray tokens) are diagnosed by the compiler, which knows which
/// directive it was reading.
pub fn tokenize(input: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut token_line = 1;
    let mut line = 1;
    let mut quote: Option<char> = None;
    let mut in_comment = false;

    for c in input.chars() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                line += 1;
            }
            continue;
        }

        if let Some(q) = quote {
            if c == q {
                // Closing quote ends the token even if it is empty.
                tokens.push(Token {
                    text: std::mem::take(&mut current),
                    line: token_line,
                });
                quote = None;
            } else {
                if c == '\n' {
                    line += 1;
                }
                current.push(c);
            }
            continue;
        }

        match c {
            '"' | '\'' => {
                flush(&mut current, &mut tokens, token_line);
                token_line = line;
                quote = Some(c);
            }
            '#' => {
                flush(&mut current, &mut tokens, token_line);
                in_comment = true;
            }
            '{' | '}' => {
                flush(&mut current, &mut tokens, token_line);
                tokens.push(Token {
                    text: c.to_string(),
                    line,
                });
            }
            c if c.is_whitespace() => {
                flush(&mut current, &mut tokens, token_line);
                if c == '\n' {
                    line += 1;
                }
            }
            c => {
                if current.is_empty() {
                    token_line = line;
                }
                current.push(c);
            }
        }
    }
    flush(&mut current, &mut tokens, token_line);

    tokens
}

fn flush(current: &mut String, tokens: &mut Vec<Token>, line: usize) {
    if !current.is_empty() {
        tokens.push(Token {
            text: std::mem::take(current),
            line,
        });
    }
}
