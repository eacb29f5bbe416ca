use crate::env::Environment;
use crate::expand::expand;

/// Output redirection of a stage: `> path` truncates, `>> path` appends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
    /// Target path, already expanded.
    pub path: String,
    /// `true` for `>>`, `false` for `>`.
    pub append: bool,
}

/// One command position in a pipeline.
///
/// `argv` may be empty when the stage only carried redirections; such stages
/// are never executed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stage {
    /// The program name (`argv[0]`) followed by its arguments, all expanded.
    pub argv: Vec<String>,
    /// Path bound to stdin by `<`.
    pub input_file: Option<String>,
    /// Path bound to stdout by `>` or `>>`.
    pub output_file: Option<OutputFile>,
}

impl Stage {
    /// Program name, if the stage has one.
    pub fn program(&self) -> Option<&str> {
        self.argv.first().map(String::as_str)
    }

    fn has_redirections(&self) -> bool {
        self.input_file.is_some() || self.output_file.is_some()
    }

    /// A stage with neither words nor redirections, e.g. the gap in `a | | b`.
    fn is_blank(&self) -> bool {
        self.argv.is_empty() && !self.has_redirections()
    }
}

/// Stages connected by pipes, in execution order.
///
/// Stage 0 is the head: only it may read from `input_file`. The last stage is
/// the tail: only it may write to `output_file`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new(stages: Vec<Stage>) -> Self {
        Self { stages }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// True for an empty or all-whitespace line.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// The only stage, when the pipeline has exactly one.
    pub fn single(&self) -> Option<&Stage> {
        match self.stages.as_slice() {
            [stage] => Some(stage),
            _ => None,
        }
    }

    /// All argv words of all stages, in order.
    pub fn flatten_argv(&self) -> Vec<String> {
        self.stages
            .iter()
            .flat_map(|stage| stage.argv.iter().cloned())
            .collect()
    }
}

/// Folds a token list into a [`Pipeline`], expanding `$NAME` in every word and
/// redirection target.
///
/// Parsing never fails:
/// - `|` closes the current stage;
/// - `<`, `>` and `>>` take the next token as their target; when repeated in
///   one stage the last one wins, and without a following token they are
///   dropped;
/// - blank stages (a leading, trailing or doubled `|`) are dropped.
///
/// Operators are matched before expansion, so a variable whose value is `|`
/// is an ordinary word.
pub fn parse(tokens: &[String], env: &Environment) -> Pipeline {
    let mut stages = Vec::new();
    let mut current = Stage::default();
    let mut iter = tokens.iter();

    while let Some(token) = iter.next() {
        match token.as_str() {
            "|" => {
                let finished = std::mem::take(&mut current);
                if !finished.is_blank() {
                    stages.push(finished);
                }
            }
            "<" => {
                if let Some(target) = iter.next() {
                    current.input_file = Some(expand(target, env));
                }
            }
            op @ (">" | ">>") => {
                if let Some(target) = iter.next() {
                    current.output_file = Some(OutputFile {
                        path: expand(target, env),
                        append: op == ">>",
                    });
                }
            }
            word => current.argv.push(expand(word, env)),
        }
    }
    if !current.is_blank() {
        stages.push(current);
    }

    Pipeline::new(stages)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::tests::empty_env;
    use crate::lexer::split_into_tokens;

    fn parse_line(line: &str) -> Pipeline {
        let env = empty_env();
        parse(&split_into_tokens(line), &env)
    }

    fn argv(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_command() {
        let p = parse_line("echo hello world");
        assert_eq!(p.len(), 1);
        let stage = p.single().unwrap();
        assert_eq!(stage.argv, argv(&["echo", "hello", "world"]));
        assert_eq!(stage.input_file, None);
        assert_eq!(stage.output_file, None);
    }

    #[test]
    fn test_empty_line_yields_no_stages() {
        assert!(parse_line("").is_empty());
        assert!(parse_line("  \t ").is_empty());
        assert!(parse(&[], &empty_env()).is_empty());
    }

    #[test]
    fn test_three_stage_pipeline_is_flat() {
        let p = parse_line("echo one | cat | wc -l");
        let stages: Vec<_> = p.stages().iter().map(|s| s.argv.clone()).collect();
        assert_eq!(stages, vec![
            argv(&["echo", "one"]),
            argv(&["cat"]),
            argv(&["wc", "-l"])
        ]);
    }

    #[test]
    fn test_redirections() {
        let p = parse_line("sort < in.txt > out.txt");
        let stage = p.single().unwrap();
        assert_eq!(stage.argv, argv(&["sort"]));
        assert_eq!(stage.input_file.as_deref(), Some("in.txt"));
        assert_eq!(
            stage.output_file,
            Some(OutputFile {
                path: "out.txt".into(),
                append: false
            })
        );

        let p = parse_line("echo more >> log.txt");
        assert_eq!(
            p.single().unwrap().output_file,
            Some(OutputFile {
                path: "log.txt".into(),
                append: true
            })
        );
    }

    #[test]
    fn test_redirection_position_is_free() {
        let p = parse_line("> out.txt echo hi");
        let stage = p.single().unwrap();
        assert_eq!(stage.argv, argv(&["echo", "hi"]));
        assert_eq!(stage.output_file.as_ref().unwrap().path, "out.txt");
    }

    #[test]
    fn test_last_redirection_wins() {
        let p = parse_line("cmd > a >> b < x < y");
        let stage = p.single().unwrap();
        assert_eq!(
            stage.output_file,
            Some(OutputFile {
                path: "b".into(),
                append: true
            })
        );
        assert_eq!(stage.input_file.as_deref(), Some("y"));

        let p = parse_line("cmd >> a > b");
        assert!(!p.single().unwrap().output_file.as_ref().unwrap().append);
    }

    #[test]
    fn test_trailing_operators_are_ignored() {
        for line in ["cat <", "cat >", "cat >>", "cat |"] {
            let p = parse_line(line);
            let stage = p.single().unwrap();
            assert_eq!(stage.argv, argv(&["cat"]), "line: {line}");
            assert_eq!(stage.input_file, None, "line: {line}");
            assert_eq!(stage.output_file, None, "line: {line}");
        }
    }

    #[test]
    fn test_blank_stages_are_dropped() {
        let p = parse_line("| a | | b |");
        let stages: Vec<_> = p.stages().iter().map(|s| s.argv.clone()).collect();
        assert_eq!(stages, vec![argv(&["a"]), argv(&["b"])]);
    }

    #[test]
    fn test_redirection_only_stage_is_kept() {
        let p = parse_line("> out.txt");
        let stage = p.single().unwrap();
        assert!(stage.argv.is_empty());
        assert_eq!(stage.program(), None);
        assert!(stage.output_file.is_some());
    }

    #[test]
    fn test_per_stage_redirections() {
        let p = parse_line("cat < in | sort | uniq > out");
        let stages = p.stages();
        assert_eq!(stages.len(), 3);
        assert_eq!(stages[0].input_file.as_deref(), Some("in"));
        assert_eq!(stages[0].output_file, None);
        assert_eq!(stages[1].input_file, None);
        assert_eq!(stages[2].output_file.as_ref().unwrap().path, "out");
    }

    #[test]
    fn test_words_and_targets_are_expanded() {
        let mut env = empty_env();
        env.set_var("DIR", "/tmp/d");
        env.set_var("NAME", "world");
        let p = parse(&split_into_tokens("echo hello $NAME > $DIR/out"), &env);
        let stage = p.single().unwrap();
        assert_eq!(stage.argv, argv(&["echo", "hello", "world"]));
        assert_eq!(stage.output_file.as_ref().unwrap().path, "/tmp/d/out");
    }

    #[test]
    fn test_operators_are_matched_before_expansion() {
        let mut env = empty_env();
        env.set_var("P", "|");
        let p = parse(&split_into_tokens("echo $P cat"), &env);
        assert_eq!(p.single().unwrap().argv, argv(&["echo", "|", "cat"]));
    }

    #[test]
    fn test_quoted_pipe_still_splits() {
        // Quotes are gone by the time the parser sees the token.
        let p = parse_line("echo a '|' b");
        assert_eq!(p.len(), 2);
    }

    #[test]
    fn test_flatten_argv_round_trip() {
        let lines = [
            "ls",
            "ls -la /tmp",
            "git commit -m msg --amend",
            "a b c d e f g h",
        ];
        for line in lines {
            let original: Vec<String> = line.split(' ').map(String::from).collect();
            let p = parse_line(line);
            assert_eq!(p.flatten_argv(), original, "line: {line}");
        }
    }
}
