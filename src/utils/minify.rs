//! JavaScript minification.
//!
//! [`WhitespaceMinifier`] removes comments and collapses whitespace outside of
//! string and template literals. Line breaks are kept (one per run of
//! whitespace) so automatic semicolon insertion behaves as in the source.
//! Regular expression literals are not recognised; a `//` inside one is read
//! as a comment.

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MinifyError {
    #[error("Unterminated string literal starting on line {0}")]
    UnterminatedString(usize),

    #[error("Unterminated block comment starting on line {0}")]
    UnterminatedComment(usize),
}

pub trait Minifier: Send + Sync {
    fn minify(&self, source: &str) -> Result<String, MinifyError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct WhitespaceMinifier;

impl Minifier for WhitespaceMinifier {
    fn minify(&self, source: &str) -> Result<String, MinifyError> {
        let chars: Vec<char> = source.chars().collect();
        let mut out = String::with_capacity(source.len());
        // Whitespace seen since the last emitted token; true if it held a newline.
        let mut pending: Option<bool> = None;
        let mut line = 1;
        let mut i = 0;

        while i < chars.len() {
            let c = chars[i];
            let next = chars.get(i + 1).copied();
            match c {
                '"' | '\'' | '`' => {
                    flush(&mut out, &mut pending);
                    let start_line = line;
                    out.push(c);
                    i += 1;
                    loop {
                        let s = *chars
                            .get(i)
                            .ok_or(MinifyError::UnterminatedString(start_line))?;
                        out.push(s);
                        i += 1;
                        match s {
                            '\\' => {
                                if let Some(&escaped) = chars.get(i) {
                                    if escaped == '\n' {
                                        line += 1;
                                    }
                                    out.push(escaped);
                                    i += 1;
                                }
                            }
                            '\n' if c == '`' => line += 1,
                            '\n' => return Err(MinifyError::UnterminatedString(start_line)),
                            _ if s == c => break,
                            _ => {}
                        }
                    }
                    continue;
                }
                '/' if next == Some('/') => {
                    while i < chars.len() && chars[i] != '\n' {
                        i += 1;
                    }
                    pending = Some(pending.unwrap_or(false));
                    continue;
                }
                '/' if next == Some('*') => {
                    let start_line = line;
                    let mut newline = false;
                    i += 2;
                    loop {
                        match chars.get(i) {
                            None => return Err(MinifyError::UnterminatedComment(start_line)),
                            Some('*') if chars.get(i + 1) == Some(&'/') => {
                                i += 2;
                                break;
                            }
                            Some('\n') => {
                                newline = true;
                                line += 1;
                                i += 1;
                            }
                            Some(_) => i += 1,
                        }
                    }
                    pending = Some(pending.unwrap_or(false) || newline);
                    continue;
                }
                c if c.is_whitespace() => {
                    if c == '\n' {
                        line += 1;
                    }
                    pending = Some(pending.unwrap_or(false) || c == '\n');
                }
                _ => {
                    flush(&mut out, &mut pending);
                    out.push(c);
                }
            }
            i += 1;
        }
        Ok(out)
    }
}

fn flush(out: &mut String, pending: &mut Option<bool>) {
    if let Some(newline) = pending.take() {
        if !out.is_empty() {
            out.push(if newline { '\n' } else { ' ' });
        }
    }
}
