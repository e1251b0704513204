//! Card slots and empty states for each list

use chrono::{DateTime, Local, Utc};

use super::card_list::{CardAction, CardSlots, EmptyState};
use super::escape_html;
use super::review_panel::ReviewsSnapshot;
use crate::domain::{Food, FoodReview, GoogleDriveFile, MarkdownNote, Pokemon, PokemonReview, Todo};
use crate::markdown::{render_markdown, render_markdown_inline};

const EMPTY_ICON: &str = "puzzle";

pub fn todo_empty_state() -> EmptyState {
    EmptyState::new(EMPTY_ICON, "No todos yet", "Create your first todo to get started.")
}

pub fn food_empty_state() -> EmptyState {
    EmptyState::new(EMPTY_ICON, "No food entries yet", "Share a dish to get started.")
}

pub fn pokemon_empty_state() -> EmptyState {
    EmptyState::new(EMPTY_ICON, "No Pokémon yet", "Add your first Pokémon to get started.")
}

pub fn drive_empty_state() -> EmptyState {
    EmptyState::new(EMPTY_ICON, "No photos yet", "Upload a photo to get started.")
}

pub fn note_empty_state() -> EmptyState {
    EmptyState::new(EMPTY_ICON, "No notes yet", "Once you add a note, it will appear here.")
}

fn created_line(created_at: &DateTime<Utc>) -> String {
    format!(
        r#"<div class="card-created">Created: {}</div>"#,
        created_at.with_timezone(&Local).format("%Y-%m-%d %H:%M")
    )
}

fn text_line(class: &str, text: &str) -> String {
    format!(r#"<div class="{}">{}</div>"#, class, escape_html(text))
}

/// Edit and delete for the owner; edit reads "Editing…" on the selected record
fn owner_actions(owned: bool, editing: bool) -> Vec<CardAction> {
    if !owned {
        return Vec::new();
    }
    vec![
        CardAction::new("edit", if editing { "Editing…" } else { "Edit" }),
        CardAction::new("delete", "Delete"),
    ]
}

fn reviews_action(count: Option<i64>) -> CardAction {
    CardAction::new("reviews", &format!("Reviews ({})", count.unwrap_or(0)))
}

pub fn todo_slots(selected_id: Option<String>) -> CardSlots<Todo> {
    CardSlots::new(|t: &Todo| text_line("card-title", &t.title))
        .subtitle(|t: &Todo| {
            let mut html = String::new();
            if let Some(priority) = t.priority_level {
                html.push_str(&text_line("card-priority", priority.as_str()));
            }
            html.push_str(&text_line("card-description", t.description()));
            html.push_str(&created_line(&t.created_at));
            html
        })
        .actions(move |t: &Todo, user: Option<&str>| {
            owner_actions(t.user_id.as_str() == user.unwrap_or_default(), selected_id.as_deref() == Some(&t.id))
        })
}

pub fn food_slots(selected_id: Option<String>, reviews: ReviewsSnapshot<FoodReview>) -> CardSlots<Food> {
    CardSlots::new(|f: &Food| text_line("card-title", f.title()))
        .image(|f: &Food| f.food_image_url.clone().filter(|url| !url.is_empty()))
        .subtitle(|f: &Food| {
            text_line("card-description", f.description()) + &created_line(&f.created_at)
        })
        .actions(move |f: &Food, user: Option<&str>| {
            let owned = f.user_id.as_str() == user.unwrap_or_default();
            let mut actions = owner_actions(owned, selected_id.as_deref() == Some(&f.id));
            actions.push(reviews_action(f.reviewcount));
            actions
        })
        .content(move |f: &Food| Some(reviews.render(&f.id)).filter(|html| !html.is_empty()))
}

pub fn pokemon_slots(
    selected_id: Option<String>,
    reviews: ReviewsSnapshot<PokemonReview>,
) -> CardSlots<Pokemon> {
    CardSlots::new(|p: &Pokemon| text_line("card-title", p.title()))
        .image(|p: &Pokemon| p.pokemon_image_url.clone().filter(|url| !url.is_empty()))
        .subtitle(|p: &Pokemon| {
            text_line("card-description", &p.description) + &created_line(&p.created_at)
        })
        .actions(move |p: &Pokemon, user: Option<&str>| {
            let owned = p.user_id.is_some() && p.user_id.as_deref() == user;
            let mut actions = owner_actions(owned, selected_id.as_deref() == Some(&p.id));
            actions.push(reviews_action(p.reviewcount));
            actions
        })
        .content(move |p: &Pokemon| Some(reviews.render(&p.id)).filter(|html| !html.is_empty()))
}

pub fn drive_slots(selected_id: Option<String>) -> CardSlots<GoogleDriveFile> {
    CardSlots::new(|d: &GoogleDriveFile| text_line("card-title", &d.title))
        .image(|d: &GoogleDriveFile| d.google_drive_photo_url.clone().filter(|url| !url.is_empty()))
        .subtitle(|d: &GoogleDriveFile| created_line(&d.created_at))
        .actions(move |d: &GoogleDriveFile, user: Option<&str>| {
            owner_actions(d.user_id.as_str() == user.unwrap_or_default(), selected_id.as_deref() == Some(&d.id))
        })
}

/// Headline as title, the whole note rendered below
pub fn note_slots(selected_id: Option<String>) -> CardSlots<MarkdownNote> {
    CardSlots::new(|n: &MarkdownNote| {
        format!(r#"<div class="card-title">{}</div>"#, render_markdown_inline(n.headline()))
    })
    .actions(move |n: &MarkdownNote, user: Option<&str>| {
        owner_actions(n.user_id.as_str() == user.unwrap_or_default(), selected_id.as_deref() == Some(&n.id))
    })
    .content(|n: &MarkdownNote| {
        Some(format!(r#"<div class="markdown-body">{}</div>"#, render_markdown(&n.description)))
    })
}
