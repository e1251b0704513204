//! UI Components
//!
//! Headless views: each component turns state into a view model that
//! renders to HTML markup.

mod card_list;
mod cards;
mod review_panel;

pub use card_list::{render_card_list, CardAction, CardListProps, CardListView, CardSlots, CardView, EmptyState};
pub use cards::{
    drive_empty_state, drive_slots, food_empty_state, food_slots, note_empty_state, note_slots,
    pokemon_empty_state, pokemon_slots, todo_empty_state, todo_slots,
};
pub use review_panel::{render_review_panel, PanelState, ReviewPanel, ReviewsSnapshot};

/// Escape text for element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html(r#"<a href="x">&</a>"#), "&lt;a href=&quot;x&quot;&gt;&amp;&lt;/a&gt;");
    }
}
