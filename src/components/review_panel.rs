//! Review Panel
//!
//! Per-parent panel listing reviews, with a composer for users who have
//! not reviewed the parent yet and an inline editor for their own review.
//! At most one panel is open per list.

use std::collections::HashMap;

use chrono::Local;

use super::escape_html;
use crate::domain::{ChildRecord, RecordId, UserId};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PanelState {
    #[default]
    Closed,
    Viewing {
        parent_id: String,
    },
    Composing {
        parent_id: String,
        draft: String,
    },
    Editing {
        parent_id: String,
        review_id: String,
        draft: String,
    },
}

impl PanelState {
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            PanelState::Closed => None,
            PanelState::Viewing { parent_id }
            | PanelState::Composing { parent_id, .. }
            | PanelState::Editing { parent_id, .. } => Some(parent_id),
        }
    }

    pub fn is_open_for(&self, parent_id: &str) -> bool {
        self.parent_id() == Some(parent_id)
    }

    pub fn draft(&self) -> Option<&str> {
        match self {
            PanelState::Composing { draft, .. } | PanelState::Editing { draft, .. } => Some(draft),
            _ => None,
        }
    }

    /// Review being amended, when editing
    pub fn review_id(&self) -> Option<&str> {
        match self {
            PanelState::Editing { review_id, .. } => Some(review_id),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReviewPanel {
    state: PanelState,
}

impl ReviewPanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PanelState {
        &self.state
    }

    /// Open on `parent_id`, replacing any other open panel
    pub fn open(&mut self, parent_id: &str) {
        self.state = PanelState::Viewing {
            parent_id: parent_id.to_string(),
        };
    }

    /// Once reviews are known: a signed-in user without a review composes
    pub fn settle(&mut self, parent_id: &str, has_own_review: bool, signed_in: bool) {
        if let PanelState::Viewing { parent_id: open } = &self.state {
            if open == parent_id && signed_in && !has_own_review {
                self.state = PanelState::Composing {
                    parent_id: parent_id.to_string(),
                    draft: String::new(),
                };
            }
        }
    }

    /// Edit the user's own review; ignored for anyone else's
    pub fn start_edit<C: ChildRecord>(&mut self, review: &C, user_id: Option<&str>) -> bool {
        if !review.is_owned_by(user_id) || !self.state.is_open_for(review.parent_id()) {
            return false;
        }
        self.state = PanelState::Editing {
            parent_id: review.parent_id().to_string(),
            review_id: review.id().to_string(),
            draft: review.comment().to_string(),
        };
        true
    }

    pub fn set_draft(&mut self, text: &str) {
        match &mut self.state {
            PanelState::Composing { draft, .. } | PanelState::Editing { draft, .. } => {
                *draft = text.to_string();
            }
            _ => {}
        }
    }

    /// Drop the draft, keep the panel open
    pub fn cancel(&mut self) {
        self.back_to_viewing();
    }

    /// After a successful save
    pub fn finish_save(&mut self) {
        self.back_to_viewing();
    }

    pub fn close(&mut self) {
        self.state = PanelState::Closed;
    }

    fn back_to_viewing(&mut self) {
        if let Some(parent_id) = self.state.parent_id() {
            self.state = PanelState::Viewing {
                parent_id: parent_id.to_string(),
            };
        }
    }
}

/// Everything a list needs to draw the panel under its cards
#[derive(Debug, Clone)]
pub struct ReviewsSnapshot<C> {
    pub panel: PanelState,
    pub reviews: HashMap<RecordId, Vec<C>>,
    pub loading_parent: Option<RecordId>,
    pub current_user_id: Option<UserId>,
}

impl<C> Default for ReviewsSnapshot<C> {
    fn default() -> Self {
        Self {
            panel: PanelState::Closed,
            reviews: HashMap::new(),
            loading_parent: None,
            current_user_id: None,
        }
    }
}

impl<C: ChildRecord> ReviewsSnapshot<C> {
    pub fn render(&self, parent_id: &str) -> String {
        render_review_panel(
            &self.panel,
            parent_id,
            self.reviews.get(parent_id).map(Vec::as_slice),
            self.loading_parent.as_deref() == Some(parent_id),
            self.current_user_id.as_deref(),
        )
    }
}

/// Markup of the panel under `parent_id`; empty when it is not open there
pub fn render_review_panel<C: ChildRecord>(
    state: &PanelState,
    parent_id: &str,
    reviews: Option<&[C]>,
    loading: bool,
    current_user_id: Option<&str>,
) -> String {
    if !state.is_open_for(parent_id) {
        return String::new();
    }
    let reviews = reviews.unwrap_or_default();
    let composing = matches!(state, PanelState::Composing { .. });

    let mut html = format!(
        r#"<div class="review-panel"><div class="review-header">Reviews ({})<button data-action="close-reviews">Close</button></div>"#,
        reviews.len()
    );
    if loading {
        html.push_str(r#"<div class="review-loading"><span class="spinner"></span></div></div>"#);
        return html;
    }

    html.push_str(r#"<div class="review-list">"#);
    if reviews.is_empty() && !composing {
        html.push_str(r#"<div class="review-empty">No reviews yet. Be the first to review!</div>"#);
    }
    for review in reviews {
        html.push_str(&render_review(state, review, current_user_id));
    }
    html.push_str("</div>");

    if let PanelState::Composing { draft, .. } = state {
        html.push_str(&render_editor(draft, "Submit Review"));
    }
    html.push_str("</div>");
    html
}

fn render_review<C: ChildRecord>(state: &PanelState, review: &C, current_user_id: Option<&str>) -> String {
    let own = review.is_owned_by(current_user_id);
    let mut html = format!(
        r#"<div class="review{}" data-id="{}">"#,
        if own { " own" } else { "" },
        escape_html(review.id())
    );

    match state {
        PanelState::Editing { review_id, draft, .. } if review_id == review.id() => {
            html.push_str(&render_editor(draft, "Save"));
        }
        _ => {
            html.push_str(&format!(
                r#"<p class="review-comment">{}</p><span class="review-date">{}</span>"#,
                escape_html(review.comment()),
                created_label(review)
            ));
            if own {
                html.push_str(
                    r#"<button data-action="edit-review">Edit</button><button data-action="delete-review">Delete</button>"#,
                );
            }
        }
    }
    html.push_str("</div>");
    html
}

fn render_editor(draft: &str, submit_label: &str) -> String {
    let disabled = if draft.trim().is_empty() { " disabled" } else { "" };
    format!(
        r#"<form class="review-editor"><input maxlength="2048" placeholder="Write your review..." value="{}"><button type="submit"{}>{}</button><button type="button" data-action="cancel-review">Cancel</button></form>"#,
        escape_html(draft),
        disabled,
        submit_label
    )
}

fn created_label<C: ChildRecord>(review: &C) -> String {
    review
        .created_at()
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FoodReview;
    use chrono::Utc;

    fn review(id: &str, user: &str, comment: &str) -> FoodReview {
        FoodReview {
            id: id.to_string(),
            food_id: "f1".to_string(),
            user_id: user.to_string(),
            comment: comment.to_string(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_open_then_compose_without_own_review() {
        let mut panel = ReviewPanel::new();
        panel.open("f1");
        assert_eq!(panel.state(), &PanelState::Viewing { parent_id: "f1".into() });

        panel.settle("f1", false, true);
        assert!(matches!(panel.state(), PanelState::Composing { draft, .. } if draft.is_empty()));
    }

    #[test]
    fn test_settle_keeps_viewing() {
        let mut panel = ReviewPanel::new();
        panel.open("f1");
        panel.settle("f1", true, true);
        assert!(matches!(panel.state(), PanelState::Viewing { .. }));
        panel.settle("f1", false, false);
        assert!(matches!(panel.state(), PanelState::Viewing { .. }));
        // settled for a panel that was moved elsewhere
        panel.settle("f2", false, true);
        assert!(matches!(panel.state(), PanelState::Viewing { .. }));
    }

    #[test]
    fn test_edit_only_own_review() {
        let mut panel = ReviewPanel::new();
        panel.open("f1");
        assert!(!panel.start_edit(&review("r2", "U2", "meh"), Some("U1")));
        assert!(panel.start_edit(&review("r1", "U1", "tasty"), Some("U1")));
        assert_eq!(panel.state().draft(), Some("tasty"));
        assert_eq!(panel.state().review_id(), Some("r1"));

        panel.set_draft("very tasty");
        assert_eq!(panel.state().draft(), Some("very tasty"));
        panel.cancel();
        assert_eq!(panel.state(), &PanelState::Viewing { parent_id: "f1".into() });
        panel.close();
        assert_eq!(panel.state(), &PanelState::Closed);
    }

    #[test]
    fn test_render_closed_elsewhere_is_empty() {
        let mut panel = ReviewPanel::new();
        panel.open("f2");
        let html = render_review_panel::<FoodReview>(panel.state(), "f1", None, false, None);
        assert!(html.is_empty());
    }

    #[test]
    fn test_render_lists_reviews_with_own_actions() {
        let mut panel = ReviewPanel::new();
        panel.open("f1");
        let reviews = vec![review("r1", "U1", "<3 tacos"), review("r2", "U2", "ok")];
        let html = render_review_panel(panel.state(), "f1", Some(reviews.as_slice()), false, Some("U1"));
        assert!(html.contains("Reviews (2)"));
        assert!(html.contains("&lt;3 tacos"));
        assert_eq!(html.matches("edit-review").count(), 1);

        let loading = render_review_panel(panel.state(), "f1", Some(reviews.as_slice()), true, Some("U1"));
        assert!(loading.contains("spinner"));
        assert!(!loading.contains("tacos"));
    }

    #[test]
    fn test_render_composer() {
        let mut panel = ReviewPanel::new();
        panel.open("f1");
        let html = render_review_panel::<FoodReview>(panel.state(), "f1", Some(&[]), false, Some("U1"));
        assert!(html.contains("No reviews yet"));

        panel.settle("f1", false, true);
        let html = render_review_panel::<FoodReview>(panel.state(), "f1", Some(&[]), false, Some("U1"));
        assert!(!html.contains("No reviews yet"));
        assert!(html.contains(r#"<button type="submit" disabled>Submit Review</button>"#));
    }
}
