//! Received command-line tokenizing.
//!
//! An input line carries one or more sub-commands separated by unquoted
//! `;`. Each sub-command is a case-insensitive command path followed,
//! after the first space, by a comma-separated parameter list in which
//! quoted strings may themselves contain commas and separators.

use crate::error::ScpiError;

/// Placeholder swapped in for commas inside quoted strings while the
/// parameter list is split. ASCII unit separator; cannot occur in input.
const QUOTED_COMMA: char = '\u{1f}';

/// Split a raw input line on unquoted `;` into sub-command statements.
///
/// Statements are trimmed; empty statements are dropped.
pub fn split_statements(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    for (ix, c) in line.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ';' if !in_quotes => {
                parts.push(&line[start..ix]);
                start = ix + 1;
            }
            _ => {}
        }
    }
    parts.push(&line[start..]);
    parts
        .into_iter()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// One parsed sub-command: the upper-cased path and its raw parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedCommand {
    /// The `:`-separated command path, upper-cased for matching.
    pub path: String,
    /// Raw parameter strings, quoting resolved but not yet typed.
    pub params: Vec<String>,
}

impl ParsedCommand {
    /// Split a statement into its path and raw parameter strings.
    ///
    /// Parameters begin at the first space. Before the comma split,
    /// commas inside quoted strings are substituted with a private
    /// placeholder and restored afterwards, so a quoted parameter may
    /// itself contain commas; surrounding quotes are then stripped.
    pub fn parse(statement: &str) -> Result<Self, ScpiError> {
        let statement = statement.trim();
        if statement.is_empty() {
            return Err(ScpiError::Syntax);
        }
        match statement.find(' ') {
            None => Ok(Self {
                path: statement.to_ascii_uppercase(),
                params: Vec::new(),
            }),
            Some(ix) => Ok(Self {
                path: statement[..ix].to_ascii_uppercase(),
                params: split_params(statement[ix..].trim_start())?,
            }),
        }
    }
}

/// Split a raw parameter list on commas, honouring quoted strings.
fn split_params(raw: &str) -> Result<Vec<String>, ScpiError> {
    let mut masked = String::with_capacity(raw.len());
    let mut in_quotes = false;
    for c in raw.chars() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
                masked.push(c);
            }
            ',' if in_quotes => masked.push(QUOTED_COMMA),
            _ => masked.push(c),
        }
    }
    if in_quotes {
        return Err(ScpiError::Syntax);
    }
    Ok(masked
        .split(',')
        .map(|part| {
            let part = part.trim();
            let part = part
                .strip_prefix('"')
                .and_then(|p| p.strip_suffix('"'))
                .unwrap_or(part);
            part.replace(QUOTED_COMMA, ",")
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statements_split_on_unquoted_separator() {
        assert_eq!(
            split_statements("*CLS; SYST:ERR?"),
            vec!["*CLS", "SYST:ERR?"]
        );
        assert_eq!(
            split_statements("SYST:PRIN \"a;b\";*STB?"),
            vec!["SYST:PRIN \"a;b\"", "*STB?"]
        );
        assert_eq!(split_statements(" ; ;*IDN?"), vec!["*IDN?"]);
    }

    #[test]
    fn path_only_statement_has_no_params() {
        let cmd = ParsedCommand::parse("syst:err?").unwrap();
        assert_eq!(cmd.path, "SYST:ERR?");
        assert!(cmd.params.is_empty());
    }

    #[test]
    fn params_start_at_first_space() {
        let cmd = ParsedCommand::parse("sour:lev 0.5,MAX").unwrap();
        assert_eq!(cmd.path, "SOUR:LEV");
        assert_eq!(cmd.params, vec!["0.5".to_string(), "MAX".to_string()]);
    }

    #[test]
    fn quoted_param_keeps_commas_and_loses_quotes() {
        let cmd = ParsedCommand::parse("DISP:MESS \"one, two, three\"").unwrap();
        assert_eq!(cmd.params, vec!["one, two, three".to_string()]);

        let cmd = ParsedCommand::parse("CMD \"a,b\",plain,\"c\"").unwrap();
        assert_eq!(
            cmd.params,
            vec!["a,b".to_string(), "plain".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn params_are_trimmed() {
        let cmd = ParsedCommand::parse("OUT:LEV 1,  2").unwrap();
        assert_eq!(cmd.params, vec!["1".to_string(), "2".to_string()]);
    }

    #[test]
    fn unterminated_quote_is_a_syntax_error() {
        assert_eq!(
            ParsedCommand::parse("DISP:MESS \"oops"),
            Err(ScpiError::Syntax)
        );
    }

    #[test]
    fn empty_statement_is_a_syntax_error() {
        assert_eq!(ParsedCommand::parse("   "), Err(ScpiError::Syntax));
    }
}
