//! Console command parsing.

pub const HELP_TEXT: &str = "\
Commands (aliases in parentheses):
  help (?)                              show this help
  config (c) create (c)                 write a new keyword template and open it
  config (c) load (l) <file>            load a keyword file from the keyword directory
  config (c) directory (d) list (l)     list files in the keyword directory
  config (c) directory (d) open (o)     open the keyword directory
  quota (q) usage (u)                   show the API quota used this session
  youtube (t) video (v) read (r)        show the current video and live chat ids
  quit / exit                           stop reading chat and exit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ConfigCreate,
    ConfigLoad(String),
    DirectoryList,
    DirectoryOpen,
    QuotaUsage,
    VideoRead,
    Quit,
    /// Blank input
    Empty,
    /// Unknown command or missing parameter, with the response to show
    Invalid(String),
}

fn word_is(word: Option<&&str>, name: &str, alias: &str) -> bool {
    word.map(|w| {
        let w = w.to_lowercase();
        w == name || w == alias
    })
    .unwrap_or(false)
}

fn missing(usage: &str) -> Command {
    Command::Invalid(format!("Missing parameter, usage: {}", usage))
}

/// Parse one input line. Command words are case-insensitive; the file name of
/// `config load` keeps its case and may contain spaces.
pub fn parse(line: &str) -> Command {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let Some(first) = parts.first() else {
        return Command::Empty;
    };

    match first.to_lowercase().as_str() {
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "config" | "c" => parse_config(&parts[1..]),
        "quota" | "q" => {
            if parts.len() == 1 || word_is(parts.get(1), "usage", "u") {
                Command::QuotaUsage
            } else {
                Command::Invalid(format!("Unknown quota command '{}'", parts[1]))
            }
        }
        "youtube" | "t" => {
            if word_is(parts.get(1), "video", "v") && word_is(parts.get(2), "read", "r") {
                Command::VideoRead
            } else {
                missing("youtube video read")
            }
        }
        other => Command::Invalid(format!(
            "Unknown command '{}', type 'help' for a list of commands",
            other
        )),
    }
}

fn parse_config(args: &[&str]) -> Command {
    let Some(sub) = args.first() else {
        return missing("config <create|load|directory>");
    };

    match sub.to_lowercase().as_str() {
        "create" | "c" => Command::ConfigCreate,
        "load" | "l" => {
            let file = args[1..].join(" ");
            let file = file.trim_matches('"');
            if file.is_empty() {
                missing("config load <file>")
            } else {
                Command::ConfigLoad(file.to_string())
            }
        }
        "directory" | "d" => {
            if word_is(args.get(1), "list", "l") {
                Command::DirectoryList
            } else if word_is(args.get(1), "open", "o") {
                Command::DirectoryOpen
            } else {
                missing("config directory <list|open>")
            }
        }
        other => Command::Invalid(format!("Unknown config command '{}'", other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!(parse("help"), Command::Help);
        assert_eq!(parse("?"), Command::Help);
        assert_eq!(parse("c c"), Command::ConfigCreate);
        assert_eq!(parse("CONFIG Create"), Command::ConfigCreate);
        assert_eq!(parse("c d l"), Command::DirectoryList);
        assert_eq!(parse("config directory open"), Command::DirectoryOpen);
        assert_eq!(parse("q usage"), Command::QuotaUsage);
        assert_eq!(parse("quota"), Command::QuotaUsage);
        assert_eq!(parse("t video read"), Command::VideoRead);
        assert_eq!(parse("exit"), Command::Quit);
    }

    #[test]
    fn test_parse_load_keeps_file_name() {
        assert_eq!(
            parse("c l NewTemplate (1).txt"),
            Command::ConfigLoad("NewTemplate (1).txt".to_string())
        );
        assert_eq!(
            parse("config load \"My Keys.txt\""),
            Command::ConfigLoad("My Keys.txt".to_string())
        );
    }

    #[test]
    fn test_parse_missing_parameters() {
        assert!(matches!(parse("config"), Command::Invalid(_)));
        assert!(matches!(parse("config load"), Command::Invalid(_)));
        assert!(matches!(parse("config directory"), Command::Invalid(_)));
        assert!(matches!(parse("youtube video"), Command::Invalid(_)));
    }

    #[test]
    fn test_parse_unknown_and_empty() {
        assert_eq!(parse("   "), Command::Empty);
        match parse("dance") {
            Command::Invalid(response) => assert!(response.contains("dance")),
            other => panic!("Expected Invalid, got {:?}", other),
        }
    }
}
