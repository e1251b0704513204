//! Generic Card List
//!
//! Pure renderer shared by every domain list. Domain differences arrive as
//! a `CardSlots` capability struct: a required title and optional image,
//! subtitle, actions and extra content. Slot output is markup; plain text
//! must go through `escape_html` first.
//!
//! Loading wins over everything, then the empty state, then one card per
//! item in the order given.

use serde::Serialize;

use super::escape_html;
use crate::domain::Entity;

/// Shown when the list is empty. Without an icon nothing is shown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmptyState {
    pub icon: Option<&'static str>,
    pub title: String,
    pub description: String,
}

impl EmptyState {
    pub fn new(icon: &'static str, title: &str, description: &str) -> Self {
        Self {
            icon: Some(icon),
            title: title.to_string(),
            description: description.to_string(),
        }
    }
}

/// Button on a card
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardAction {
    /// Command key, e.g. `edit`, `delete`, `reviews`
    pub key: &'static str,
    pub label: String,
    pub enabled: bool,
}

impl CardAction {
    pub fn new(key: &'static str, label: &str) -> Self {
        Self {
            key,
            label: label.to_string(),
            enabled: true,
        }
    }

    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}

type TextSlot<T> = Box<dyn Fn(&T) -> String + Send + Sync>;
type OptionalSlot<T> = Box<dyn Fn(&T) -> Option<String> + Send + Sync>;
type ActionsSlot<T> = Box<dyn Fn(&T, Option<&str>) -> Vec<CardAction> + Send + Sync>;

pub struct CardSlots<T> {
    title: TextSlot<T>,
    image: Option<OptionalSlot<T>>,
    subtitle: Option<TextSlot<T>>,
    actions: Option<ActionsSlot<T>>,
    content: Option<OptionalSlot<T>>,
}

impl<T> CardSlots<T> {
    pub fn new(title: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        Self {
            title: Box::new(title),
            image: None,
            subtitle: None,
            actions: None,
            content: None,
        }
    }

    /// Image URL for the card
    pub fn image(mut self, image: impl Fn(&T) -> Option<String> + Send + Sync + 'static) -> Self {
        self.image = Some(Box::new(image));
        self
    }

    pub fn subtitle(mut self, subtitle: impl Fn(&T) -> String + Send + Sync + 'static) -> Self {
        self.subtitle = Some(Box::new(subtitle));
        self
    }

    /// Actions given the item and the current user id
    pub fn actions(
        mut self,
        actions: impl Fn(&T, Option<&str>) -> Vec<CardAction> + Send + Sync + 'static,
    ) -> Self {
        self.actions = Some(Box::new(actions));
        self
    }

    /// Extra markup under the card, such as a review panel
    pub fn content(mut self, content: impl Fn(&T) -> Option<String> + Send + Sync + 'static) -> Self {
        self.content = Some(Box::new(content));
        self
    }
}

pub struct CardListProps<'a, T> {
    pub items: &'a [T],
    pub is_loading: bool,
    pub empty_state: &'a EmptyState,
    pub slots: &'a CardSlots<T>,
    pub current_user_id: Option<&'a str>,
    pub class_name: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CardView {
    pub id: String,
    pub title: String,
    pub image: Option<String>,
    pub subtitle: Option<String>,
    /// `None` when the list has no actions slot
    pub actions: Option<Vec<CardAction>>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CardListView {
    Loading,
    Empty(EmptyState),
    /// Empty list without an icon: nothing to show
    Nothing,
    Cards {
        class_name: Option<String>,
        cards: Vec<CardView>,
    },
}

pub fn render_card_list<T: Entity>(props: &CardListProps<'_, T>) -> CardListView {
    if props.is_loading {
        return CardListView::Loading;
    }
    if props.items.is_empty() {
        return match props.empty_state.icon {
            Some(_) => CardListView::Empty(props.empty_state.clone()),
            None => CardListView::Nothing,
        };
    }

    let slots = props.slots;
    let cards = props
        .items
        .iter()
        .map(|item| CardView {
            id: item.id().to_string(),
            title: (slots.title)(item),
            image: slots.image.as_ref().and_then(|image| image(item)),
            subtitle: slots.subtitle.as_ref().map(|subtitle| subtitle(item)),
            actions: slots
                .actions
                .as_ref()
                .map(|actions| actions(item, props.current_user_id)),
            content: slots.content.as_ref().and_then(|content| content(item)),
        })
        .collect();

    CardListView::Cards {
        class_name: props.class_name.map(str::to_string),
        cards,
    }
}

impl CardListView {
    pub fn card_count(&self) -> usize {
        match self {
            CardListView::Cards { cards, .. } => cards.len(),
            _ => 0,
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            CardListView::Loading => {
                r#"<div class="card-list-loading"><span class="spinner"></span></div>"#.to_string()
            }
            CardListView::Nothing => String::new(),
            CardListView::Empty(empty) => format!(
                r#"<div class="empty-placeholder"><span class="icon icon-{}"></span><h3>{}</h3><p>{}</p></div>"#,
                escape_html(empty.icon.unwrap_or_default()),
                escape_html(&empty.title),
                escape_html(&empty.description)
            ),
            CardListView::Cards { class_name, cards } => {
                let mut html = format!(
                    r#"<div class="card-list {}">"#,
                    escape_html(class_name.as_deref().unwrap_or_default())
                );
                for card in cards {
                    html.push_str(&card.to_html());
                }
                html.push_str("</div>");
                html
            }
        }
    }
}

impl CardView {
    fn to_html(&self) -> String {
        let mut html = format!(r#"<article class="card" data-id="{}">"#, escape_html(&self.id));
        html.push_str(r#"<div class="card-header">"#);
        if let Some(image) = &self.image {
            html.push_str(&format!(r#"<img src="{}" alt="">"#, escape_html(image)));
        }
        html.push_str(&format!(r#"<div class="card-body">{}"#, self.title));
        if let Some(subtitle) = &self.subtitle {
            html.push_str(subtitle);
        }
        html.push_str("</div></div>");

        if let Some(actions) = &self.actions {
            html.push_str(r#"<div class="card-actions">"#);
            for action in actions {
                html.push_str(&format!(
                    r#"<button data-action="{}"{}>{}</button>"#,
                    action.key,
                    if action.enabled { "" } else { " disabled" },
                    escape_html(&action.label)
                ));
            }
            html.push_str("</div>");
        }
        if let Some(content) = &self.content {
            html.push_str(content);
        }
        html.push_str("</article>");
        html
    }
}
