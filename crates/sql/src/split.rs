use crate::model::SqlBatch;

/// How finely a script is cut before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitStrategy {
    /// One unit per `GO`-separated batch.
    #[default]
    Batches,
    /// Batches further cut on `;`, for drivers that reject compound batches.
    Statements,
}

/// Cut `script` into executable units.
///
/// Batches are separated by lines consisting only of `GO` (any case). Lines whose
/// trimmed text starts with `--` are removed before a batch is considered, so a
/// batch made only of comments disappears entirely.
pub fn split_script(script: &str, strategy: SplitStrategy) -> Vec<SqlBatch> {
    let mut pieces: Vec<String> = Vec::new();

    for batch in go_batches(script) {
        let cleaned = strip_comment_lines(&batch);
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            continue;
        }

        match strategy {
            SplitStrategy::Batches => pieces.push(cleaned.to_string()),
            SplitStrategy::Statements => {
                pieces.extend(split_statements(cleaned));
            }
        }
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, sql)| SqlBatch::new(i + 1, sql))
        .collect()
}

fn go_batches(script: &str) -> Vec<String> {
    let mut batches = Vec::new();
    let mut current = String::new();

    for line in script.lines() {
        if line.trim().eq_ignore_ascii_case("GO") {
            batches.push(std::mem::take(&mut current));
            continue;
        }
        current.push_str(line);
        current.push('\n');
    }
    batches.push(current);

    batches
}

fn strip_comment_lines(batch: &str) -> String {
    batch
        .lines()
        .filter(|line| !line.trim_start().starts_with("--"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split on `;` outside quoted text, bracketed names and line comments.
fn split_statements(batch: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut chars = batch.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        match quote {
            Some(close) => {
                current.push(ch);
                if ch == close {
                    // '' inside a literal is an escaped quote
                    if close == '\'' && chars.peek() == Some(&'\'') {
                        if let Some(next) = chars.next() {
                            current.push(next);
                        }
                    } else {
                        quote = None;
                    }
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '[' => {
                    quote = Some(']');
                    current.push(ch);
                }
                '-' if chars.peek() == Some(&'-') => {
                    current.push(ch);
                    for rest in chars.by_ref() {
                        current.push(rest);
                        if rest == '\n' {
                            break;
                        }
                    }
                }
                ';' => push_trimmed(&mut out, &mut current),
                _ => current.push(ch),
            },
        }
    }
    push_trimmed(&mut out, &mut current);

    out
}

fn push_trimmed(out: &mut Vec<String>, current: &mut String) {
    let piece = current.trim();
    if !piece.is_empty() {
        out.push(piece.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::{split_script, SplitStrategy};

    fn sqls(script: &str, strategy: SplitStrategy) -> Vec<String> {
        split_script(script, strategy)
            .into_iter()
            .map(|b| b.sql)
            .collect()
    }

    #[test]
    fn comment_only_batch_is_dropped() {
        let got = sqls(
            "SELECT 1\nGO\n-- comment only\nGO\nSELECT 2",
            SplitStrategy::Batches,
        );
        assert_eq!(got, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn go_is_case_insensitive_and_may_be_indented() {
        let got = sqls("SELECT 1\n  go  \nSELECT 2\r\nGo\r\n", SplitStrategy::Batches);
        assert_eq!(got, vec!["SELECT 1", "SELECT 2"]);
    }

    #[test]
    fn go_inside_a_line_does_not_split() {
        let got = sqls("SELECT 'GO' AS word\nFROM t", SplitStrategy::Batches);
        assert_eq!(got, vec!["SELECT 'GO' AS word\nFROM t"]);
    }

    #[test]
    fn batch_keeps_semicolons_when_not_splitting_statements() {
        let got = sqls("INSERT INTO a VALUES (1);\nINSERT INTO a VALUES (2);", SplitStrategy::Batches);
        assert_eq!(got.len(), 1);
    }

    #[test]
    fn statements_strategy_splits_on_semicolons() {
        let got = sqls(
            "CREATE TABLE a (x INT);\n-- seed\nINSERT INTO a VALUES (1);\nGO\nSELECT 2;",
            SplitStrategy::Statements,
        );
        assert_eq!(
            got,
            vec!["CREATE TABLE a (x INT)", "INSERT INTO a VALUES (1)", "SELECT 2"]
        );
    }

    #[test]
    fn semicolons_inside_literals_and_names_are_kept() {
        let got = sqls(
            "INSERT INTO [odd;name] VALUES ('a;b', 'it''s; fine'); SELECT 1",
            SplitStrategy::Statements,
        );
        assert_eq!(
            got,
            vec![
                "INSERT INTO [odd;name] VALUES ('a;b', 'it''s; fine')",
                "SELECT 1"
            ]
        );
    }

    #[test]
    fn ordinals_are_one_based_and_contiguous() {
        let batches = split_script("A\nGO\n\nGO\nB\nGO\nC", SplitStrategy::Batches);
        let ordinals: Vec<usize> = batches.iter().map(|b| b.ordinal).collect();
        assert_eq!(ordinals, vec![1, 2, 3]);
    }

    #[test]
    fn empty_script_yields_nothing() {
        assert!(split_script("", SplitStrategy::Batches).is_empty());
        assert!(split_script("-- only a comment\n\n", SplitStrategy::Statements).is_empty());
    }
}
