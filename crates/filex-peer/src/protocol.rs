//! Request parsing and reply texts.
//!
//! Requests are whitespace-separated tokens: a command word followed by its
//! arguments. Replies are plain text; error replies always start with
//! `Error:`.

use filex_store::Listing;

use crate::error::CommandError;

pub const REGISTER: &str = "/register";
pub const STORE: &str = "/store";
pub const GET: &str = "/get";
pub const DIR: &str = "/dir";
pub const JOIN: &str = "/join";
pub const LEAVE: &str = "/leave";

/// Prefix shared by every error reply.
pub const ERROR_PREFIX: &str = "Error:";
/// Prefix of a successful registration reply.
pub const WELCOME_PREFIX: &str = "Welcome";

pub const LEFT: &str = "Left the server.";
pub const JOINED: &str = "Joined the server successfully.";
pub const DIRECTORY_HEADER: &str = "Directory list:";
pub const DIRECTORY_EMPTY: &str = "Directory is empty.";

pub const ALREADY_REGISTERED: &str = "Error: Already registered.";
pub const ALREADY_JOINED: &str = "Error: Already joined.";
pub const NOT_JOINED: &str = "Error: Not joined yet.";
pub const STORE_BEFORE_REGISTER: &str = "Error: Please join the server before storing files.";
pub const DIR_BEFORE_REGISTER: &str =
    "Error: Please join the server before requesting directory list.";
pub const GET_BEFORE_REGISTER: &str = "Error: Please join the server before requesting files.";

/// A parsed client request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Register { handle: String },
    Store { name: String },
    Get { name: String },
    Dir,
    Join,
    Leave,
}

impl Request {
    /// Parse one request line.
    ///
    /// Returns `Ok(None)` for a blank line.
    pub fn parse(line: &str) -> Result<Option<Self>, CommandError> {
        let mut tokens = line.split_whitespace();
        let Some(command) = tokens.next() else {
            return Ok(None);
        };
        let args: Vec<&str> = tokens.collect();

        let request = match command {
            REGISTER => Request::Register {
                handle: single_arg(&args, "/register <handle>")?,
            },
            STORE => Request::Store {
                name: single_arg(&args, "/store <filename>")?,
            },
            GET => Request::Get {
                name: single_arg(&args, "/get <filename>")?,
            },
            DIR => {
                no_args(&args, "/dir")?;
                Request::Dir
            }
            JOIN => {
                no_args(&args, "/join")?;
                Request::Join
            }
            LEAVE => {
                no_args(&args, "/leave")?;
                Request::Leave
            }
            other => return Err(CommandError::UnknownCommand(other.to_string())),
        };
        Ok(Some(request))
    }

    /// Wire text of this request, without terminator.
    pub fn to_line(&self) -> String {
        match self {
            Request::Register { handle } => format!("{REGISTER} {handle}"),
            Request::Store { name } => format!("{STORE} {name}"),
            Request::Get { name } => format!("{GET} {name}"),
            Request::Dir => DIR.to_string(),
            Request::Join => JOIN.to_string(),
            Request::Leave => LEAVE.to_string(),
        }
    }
}

fn single_arg(args: &[&str], usage: &'static str) -> Result<String, CommandError> {
    match args {
        [arg] => Ok((*arg).to_string()),
        _ => Err(CommandError::Usage(usage)),
    }
}

fn no_args(args: &[&str], usage: &'static str) -> Result<(), CommandError> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandError::Usage(usage))
    }
}

pub fn welcome(handle: &str) -> String {
    format!("Welcome {handle}!")
}

/// Reply text for a `/dir` request.
pub fn render_listing(listing: &Listing) -> String {
    match listing {
        Listing::Empty => DIRECTORY_EMPTY.to_string(),
        Listing::Names(names) => format!("{DIRECTORY_HEADER}\n{}", names.join("\n")),
    }
}

/// Inverse of [`render_listing`]. Returns `None` for any other reply.
pub fn parse_listing(reply: &str) -> Option<Listing> {
    if reply == DIRECTORY_EMPTY {
        return Some(Listing::Empty);
    }
    let rest = reply.strip_prefix(DIRECTORY_HEADER)?;
    let names: Vec<String> = rest
        .split('\n')
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if names.is_empty() {
        return Some(Listing::Empty);
    }
    Some(Listing::Names(names))
}

pub fn is_error_reply(reply: &[u8]) -> bool {
    reply.starts_with(ERROR_PREFIX.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CommandErrorKind;

    #[test]
    fn parses_each_command() {
        assert_eq!(
            Request::parse("/register alice").unwrap(),
            Some(Request::Register {
                handle: "alice".to_string()
            })
        );
        assert_eq!(
            Request::parse("/store a.txt").unwrap(),
            Some(Request::Store {
                name: "a.txt".to_string()
            })
        );
        assert_eq!(
            Request::parse("  /get   b.txt \r").unwrap(),
            Some(Request::Get {
                name: "b.txt".to_string()
            })
        );
        assert_eq!(Request::parse("/dir").unwrap(), Some(Request::Dir));
        assert_eq!(Request::parse("/join").unwrap(), Some(Request::Join));
        assert_eq!(Request::parse("/leave").unwrap(), Some(Request::Leave));
    }

    #[test]
    fn blank_line_is_none() {
        assert_eq!(Request::parse("").unwrap(), None);
        assert_eq!(Request::parse(" \r\t").unwrap(), None);
    }

    #[test]
    fn unknown_command_is_protocol_error() {
        let err = Request::parse("/delete a.txt").unwrap_err();
        assert_eq!(err.kind(), CommandErrorKind::Protocol);
        assert_eq!(err.to_string(), "Error: Command not found.");
    }

    #[test]
    fn commands_are_case_sensitive() {
        assert!(Request::parse("/DIR").is_err());
    }

    #[test]
    fn wrong_arity_is_usage_error() {
        let err = Request::parse("/register").unwrap_err();
        assert_eq!(err.kind(), CommandErrorKind::Protocol);
        assert_eq!(
            err.to_string(),
            "Error: Invalid parameters. Usage: /register <handle>"
        );
        assert!(Request::parse("/get a b").is_err());
        assert!(Request::parse("/dir extra").is_err());
    }

    #[test]
    fn to_line_parses_back() {
        let requests = [
            Request::Register {
                handle: "bob".to_string(),
            },
            Request::Store {
                name: "x.bin".to_string(),
            },
            Request::Dir,
            Request::Leave,
        ];
        for request in requests {
            assert_eq!(Request::parse(&request.to_line()).unwrap(), Some(request));
        }
    }

    #[test]
    fn listing_replies() {
        assert_eq!(render_listing(&Listing::Empty), "Directory is empty.");
        let listing = Listing::Names(vec!["a.txt".to_string(), "b.txt".to_string()]);
        let text = render_listing(&listing);
        assert_eq!(text, "Directory list:\na.txt\nb.txt");
        assert_eq!(parse_listing(&text), Some(listing));
        assert_eq!(parse_listing(DIRECTORY_EMPTY), Some(Listing::Empty));
        assert_eq!(parse_listing("Error: Please join"), None);
    }

    #[test]
    fn error_prefix_detection() {
        assert!(is_error_reply(b"Error: File 'x' not found."));
        assert!(!is_error_reply(b"plain file bytes"));
        assert_eq!(welcome("carol"), "Welcome carol!");
    }
}
