use helperbot_core::domain::helper::UserId;
use helperbot_core::errors::DomainError;

/// Separator between the handler prefix and its target in component custom ids.
pub const CUSTOM_ID_SEPARATOR: char = '-';

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Interaction {
    SlashCommand(CommandInvocation),
    Button(ComponentInvocation),
    SelectMenu(ComponentInvocation),
    TextMessage(TextMessage),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    SlashCommand,
    Button,
    SelectMenu,
    TextMessage,
}

impl Interaction {
    pub fn kind(&self) -> InteractionKind {
        match self {
            Self::SlashCommand(_) => InteractionKind::SlashCommand,
            Self::Button(_) => InteractionKind::Button,
            Self::SelectMenu(_) => InteractionKind::SelectMenu,
            Self::TextMessage(_) => InteractionKind::TextMessage,
        }
    }

    /// Gateway id of the interaction or message, used to correlate log lines and replies.
    pub fn correlation_id(&self) -> &str {
        match self {
            Self::SlashCommand(command) => &command.interaction_id,
            Self::Button(component) | Self::SelectMenu(component) => &component.interaction_id,
            Self::TextMessage(message) => &message.message_id,
        }
    }

    pub fn user_id(&self) -> &str {
        match self {
            Self::SlashCommand(command) => &command.user_id,
            Self::Button(component) | Self::SelectMenu(component) => &component.user_id,
            Self::TextMessage(message) => &message.author_id,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInvocation {
    pub interaction_id: String,
    pub name: String,
    pub subcommand: Option<String>,
    pub options: Vec<CommandOption>,
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandOption {
    pub name: String,
    pub value: OptionValue,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OptionValue {
    String(String),
    User(String),
}

impl CommandInvocation {
    pub fn option(&self, name: &str) -> Option<&OptionValue> {
        self.options.iter().find(|option| option.name == name).map(|option| &option.value)
    }

    pub fn string_option(&self, name: &str) -> Option<&str> {
        match self.option(name) {
            Some(OptionValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn user_option(&self, name: &str) -> Option<&str> {
        match self.option(name) {
            Some(OptionValue::User(value)) => Some(value),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComponentInvocation {
    pub interaction_id: String,
    pub custom_id: String,
    pub values: Vec<String>,
    pub user_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextMessage {
    pub message_id: String,
    pub channel_id: String,
    pub guild_id: Option<String>,
    pub author_id: String,
    pub author_is_bot: bool,
    pub content: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextCommandInvocation {
    pub name: String,
    pub args: Vec<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CustomId<'a> {
    pub prefix: &'a str,
    pub target: Option<&'a str>,
}

/// Splits `"<prefix>-<target>"`; the target is the second segment, anything after it is ignored.
pub fn parse_custom_id(custom_id: &str) -> CustomId<'_> {
    let mut segments = custom_id.split(CUSTOM_ID_SEPARATOR);
    let prefix = segments.next().unwrap_or_default();
    let target = segments.next().filter(|segment| !segment.is_empty());
    CustomId { prefix, target }
}

pub fn build_custom_id(prefix: &str, target: &str) -> String {
    format!("{prefix}{CUSTOM_ID_SEPARATOR}{target}")
}

/// User a component acts on, taken from its custom id.
pub fn target_user_id(custom_id: &str) -> Result<UserId, DomainError> {
    let target = parse_custom_id(custom_id)
        .target
        .ok_or_else(|| DomainError::InvalidUserId(custom_id.to_owned()))?;
    UserId::parse(target)
}

pub fn parse_text_command(prefix: &str, content: &str) -> Option<TextCommandInvocation> {
    let body = content.trim_start().strip_prefix(prefix)?;
    // "! helpers" is chatter, not a command
    if body.starts_with(char::is_whitespace) {
        return None;
    }
    let mut tokens = body.split_whitespace();
    let name = tokens.next()?.to_ascii_lowercase();
    Some(TextCommandInvocation { name, args: tokens.map(str::to_owned).collect() })
}

#[cfg(test)]
mod tests {
    use super::{
        build_custom_id, parse_custom_id, parse_text_command, target_user_id, CommandInvocation,
        CommandOption, OptionValue,
    };

    #[test]
    fn composite_custom_id_yields_user_id() {
        for user_id in ["12345", "0", "1234567890123456789"] {
            let custom_id = format!("lroles-{user_id}");
            let parsed = parse_custom_id(&custom_id);
            assert_eq!(parsed.prefix, "lroles");
            assert_eq!(parsed.target, Some(user_id));
            assert_eq!(target_user_id(&custom_id).expect("user id").as_str(), user_id);
        }
    }

    #[test]
    fn custom_id_without_target_has_only_a_prefix() {
        let parsed = parse_custom_id("lroles");
        assert_eq!(parsed.prefix, "lroles");
        assert_eq!(parsed.target, None);
        assert!(target_user_id("lroles").is_err());
        assert!(target_user_id("lroles-").is_err());
    }

    #[test]
    fn extra_segments_after_the_target_are_ignored() {
        assert_eq!(parse_custom_id("clearroles-42-confirm").target, Some("42"));
        assert_eq!(build_custom_id("clearroles", "42"), "clearroles-42");
    }

    #[test]
    fn non_numeric_target_is_rejected() {
        assert!(target_user_id("lroles-abc").is_err());
    }

    #[test]
    fn text_commands_need_the_prefix() {
        let invocation = parse_text_command("!", "!Helpers  ja extra").expect("command");
        assert_eq!(invocation.name, "helpers");
        assert_eq!(invocation.args, vec!["ja", "extra"]);

        assert!(parse_text_command("!", "helpers ja").is_none());
        assert!(parse_text_command("!", "! helpers").is_none());
        assert!(parse_text_command("!", "!").is_none());
    }

    #[test]
    fn typed_option_accessors() {
        let command = CommandInvocation {
            interaction_id: "1".to_owned(),
            name: "helper".to_owned(),
            subcommand: Some("add".to_owned()),
            options: vec![
                CommandOption { name: "user".to_owned(), value: OptionValue::User("42".to_owned()) },
                CommandOption {
                    name: "langs".to_owned(),
                    value: OptionValue::String("en,fr".to_owned()),
                },
            ],
            user_id: "7".to_owned(),
            channel_id: "C1".to_owned(),
            guild_id: None,
        };

        assert_eq!(command.user_option("user"), Some("42"));
        assert_eq!(command.string_option("langs"), Some("en,fr"));
        assert_eq!(command.string_option("user"), None);
        assert_eq!(command.option("missing"), None);
    }
}
