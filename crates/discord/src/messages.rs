use serde::Serialize;

use helperbot_core::domain::helper::HelperData;

use crate::interactions::build_custom_id;

/// Discord caps string select menus at this many options.
pub const SELECT_MENU_MAX_OPTIONS: usize = 25;

/// Discord rejects message content longer than this many characters.
pub const MESSAGE_MAX_CHARS: usize = 2000;

/// Per-list share of a reply that carries two tag lists.
const ROLE_LIST_BUDGET: usize = 900;

pub const ROLES_MENU_PREFIX: &str = "lroles";
pub const CLEAR_ROLES_PREFIX: &str = "clearroles";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonStyle {
    Secondary,
    Danger,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ButtonElement {
    pub custom_id: String,
    pub label: String,
    pub style: ButtonStyle,
}

impl ButtonElement {
    pub fn new(custom_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { custom_id: custom_id.into(), label: label.into(), style: ButtonStyle::Secondary }
    }

    pub fn style(mut self, style: ButtonStyle) -> Self {
        self.style = style;
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectOption {
    pub label: String,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SelectMenu {
    pub custom_id: String,
    pub placeholder: Option<String>,
    pub min_values: u8,
    pub max_values: u8,
    pub options: Vec<SelectOption>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Component {
    Buttons { buttons: Vec<ButtonElement> },
    SelectMenu { menu: SelectMenu },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageTemplate {
    pub content: String,
    pub ephemeral: bool,
    pub components: Vec<Component>,
}

pub struct MessageBuilder {
    lines: Vec<String>,
    ephemeral: bool,
    components: Vec<Component>,
}

impl MessageBuilder {
    pub fn new(first_line: impl Into<String>) -> Self {
        Self { lines: vec![first_line.into()], ephemeral: false, components: Vec::new() }
    }

    pub fn line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    pub fn ephemeral(mut self) -> Self {
        self.ephemeral = true;
        self
    }

    pub fn buttons<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut ButtonsBuilder),
    {
        let mut builder = ButtonsBuilder::default();
        build(&mut builder);
        if !builder.buttons.is_empty() {
            self.components.push(Component::Buttons { buttons: builder.buttons });
        }
        self
    }

    pub fn select_menu<F>(mut self, custom_id: impl Into<String>, build: F) -> Self
    where
        F: FnOnce(&mut SelectMenuBuilder),
    {
        let mut builder = SelectMenuBuilder::default();
        build(&mut builder);
        if let Some(menu) = builder.build(custom_id.into()) {
            self.components.push(Component::SelectMenu { menu });
        }
        self
    }

    /// Content over [`MESSAGE_MAX_CHARS`] is cut and ends with `…`.
    pub fn build(self) -> MessageTemplate {
        let mut content = self.lines.join("\n");
        if content.chars().count() > MESSAGE_MAX_CHARS {
            content = content.chars().take(MESSAGE_MAX_CHARS - 1).collect();
            content.push('…');
        }
        MessageTemplate {
            content,
            ephemeral: self.ephemeral,
            components: self.components,
        }
    }
}

#[derive(Default)]
pub struct ButtonsBuilder {
    buttons: Vec<ButtonElement>,
}

impl ButtonsBuilder {
    pub fn button(&mut self, button: ButtonElement) -> &mut Self {
        self.buttons.push(button);
        self
    }
}

#[derive(Default)]
pub struct SelectMenuBuilder {
    placeholder: Option<String>,
    options: Vec<SelectOption>,
}

impl SelectMenuBuilder {
    pub fn placeholder(&mut self, placeholder: impl Into<String>) -> &mut Self {
        self.placeholder = Some(placeholder.into());
        self
    }

    pub fn option(&mut self, label: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.options.push(SelectOption { label: label.into(), value: value.into() });
        self
    }

    /// A menu without options is rejected by Discord, so none is built.
    fn build(mut self, custom_id: String) -> Option<SelectMenu> {
        if self.options.is_empty() {
            return None;
        }
        self.options.truncate(SELECT_MENU_MAX_OPTIONS);
        let max_values = u8::try_from(self.options.len()).unwrap_or(u8::MAX);
        Some(SelectMenu {
            custom_id,
            placeholder: self.placeholder,
            min_values: 1,
            max_values,
            options: self.options,
        })
    }
}

/// Tags joined by ", " within `budget` characters, or `None` for an empty set.
fn capped_roles_summary(tags: &[String], budget: usize) -> String {
    if tags.is_empty() {
        "None".to_owned()
    } else {
        capped_join(tags, budget, ", ")
    }
}

/// Joins `items` with ", " within `budget` characters; items that do not fit are
/// counted in a trailing `…and N more` note placed after `overflow_separator`.
fn capped_join(items: &[String], budget: usize, overflow_separator: &str) -> String {
    let full = items.join(", ");
    if full.chars().count() <= budget {
        return full;
    }

    let reserve = overflow_separator.chars().count() + more_note(items.len()).chars().count();
    let limit = budget.saturating_sub(reserve);
    let mut joined = String::new();
    let mut used = 0;
    let mut shown = 0;
    for item in items {
        let cost = item.chars().count() + if shown == 0 { 0 } else { 2 };
        if used + cost > limit {
            break;
        }
        if shown > 0 {
            joined.push_str(", ");
        }
        joined.push_str(item);
        used += cost;
        shown += 1;
    }

    let note = more_note(items.len() - shown);
    if shown == 0 {
        note
    } else {
        format!("{joined}{overflow_separator}{note}")
    }
}

fn more_note(hidden: usize) -> String {
    format!("…and {hidden} more")
}

pub fn mention(user_id: &str) -> String {
    format!("<@{user_id}>")
}

pub fn role_removal_message(removed: &[String], remaining: &[String]) -> MessageTemplate {
    MessageBuilder::new(format!(
        "**Removed roles:** {}",
        capped_roles_summary(removed, ROLE_LIST_BUDGET)
    ))
    .line(format!("**Remaining roles:** {}", capped_roles_summary(remaining, ROLE_LIST_BUDGET)))
    .ephemeral()
    .build()
}

pub fn roles_added_message(user_id: &str, added: &[String], langs: &[String]) -> MessageTemplate {
    MessageBuilder::new(format!(
        "**Added roles for {}:** {}",
        mention(user_id),
        capped_roles_summary(added, ROLE_LIST_BUDGET)
    ))
    .line(format!("**Current roles:** {}", capped_roles_summary(langs, ROLE_LIST_BUDGET)))
    .ephemeral()
    .build()
}

/// Current tags of a user with a removal menu and a clear-all button.
pub fn roles_overview_message(user_id: &str, langs: &[String]) -> MessageTemplate {
    if langs.is_empty() {
        return MessageBuilder::new(format!("{} has no helper roles.", mention(user_id)))
            .ephemeral()
            .build();
    }

    let summary = capped_roles_summary(langs, 2 * ROLE_LIST_BUDGET);
    MessageBuilder::new(format!("**Roles of {}:** {summary}", mention(user_id)))
        .ephemeral()
        .select_menu(build_custom_id(ROLES_MENU_PREFIX, user_id), |menu| {
            menu.placeholder("Select roles to remove");
            for lang in langs {
                menu.option(lang.clone(), lang.clone());
            }
        })
        .buttons(|row| {
            row.button(
                ButtonElement::new(build_custom_id(CLEAR_ROLES_PREFIX, user_id), "Clear all")
                    .style(ButtonStyle::Danger),
            );
        })
        .build()
}

pub fn helpers_for_lang_message(lang: &str, helpers: &[HelperData]) -> MessageTemplate {
    if helpers.is_empty() {
        return MessageBuilder::new(format!("No helpers registered for `{lang}`.")).build();
    }

    let header = format!("**Helpers for `{lang}`** ({})", helpers.len());
    let budget = MESSAGE_MAX_CHARS.saturating_sub(header.chars().count() + 1);
    let mentions =
        helpers.iter().map(|helper| mention(helper.user_id.as_str())).collect::<Vec<_>>();
    MessageBuilder::new(header).line(capped_join(&mentions, budget, "\n")).build()
}

pub fn error_message(summary: &str, correlation_id: &str) -> MessageTemplate {
    MessageBuilder::new(format!(":warning: {summary}"))
        .line(format!("-# Reference: {correlation_id}"))
        .ephemeral()
        .build()
}

pub fn help_message(prefix: &str) -> MessageTemplate {
    MessageBuilder::new("**Available commands**")
        .line(format!("• `{prefix}helpers <lang>` list helpers for a language"))
        .line(format!("• `{prefix}help` show this message"))
        .line("• `/helper add`, `/helper roles`, `/helpers`, `/ping`")
        .build()
}

pub fn pong_message(latency_ms: Option<u64>) -> MessageTemplate {
    let content = match latency_ms {
        Some(ms) => format!("Pong! Gateway latency {ms} ms."),
        None => "Pong!".to_owned(),
    };
    MessageBuilder::new(content).ephemeral().build()
}
