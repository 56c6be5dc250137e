use askama::Template;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use uuid::Uuid;

use crate::application::error::AppError;
use crate::application::render::render_service;
use crate::domain::chat::{ChatMessage, ChatSession, Role};
use crate::domain::school::SchoolProfile;

pub fn render_template<T: Template>(template: T) -> Result<Html<String>, AppError> {
    Ok(Html(template.render()?))
}

pub fn render_template_response<T: Template>(template: T, status: StatusCode) -> Response {
    match render_template(template) {
        Ok(html) => (status, html).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Template)]
#[template(path = "chat.html")]
pub struct ChatPageTemplate {
    pub view: ChatPageView,
}

#[derive(Template)]
#[template(path = "partials/message.html")]
pub struct MessageTemplate {
    pub message: MessageView,
}

#[derive(Template)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub view: LoginView,
}

pub struct LoginView {
    pub school_name: String,
    pub failed: bool,
}

pub struct ChatPageView {
    pub school_name: String,
    pub school_year: String,
    pub sessions: Vec<SessionLinkView>,
    pub session_id: Uuid,
    pub messages: Vec<MessageView>,
    pub api_key_saved: bool,
}

pub struct SessionLinkView {
    pub href: String,
    pub title: String,
    pub active: bool,
}

pub struct MessageView {
    pub role_class: &'static str,
    pub author: String,
    pub body_html: String,
    pub attachment_names: Vec<String>,
    pub exports: Option<ExportLinksView>,
}

pub struct ExportLinksView {
    pub word_href: String,
    pub print_href: String,
}

impl ChatPageView {
    pub fn new(
        profile: &SchoolProfile,
        sessions: &[ChatSession],
        active: &ChatSession,
        api_key_saved: bool,
    ) -> Self {
        let links = sessions
            .iter()
            .map(|session| SessionLinkView {
                href: format!("/sessions/{}", session.id),
                title: session.title.clone(),
                active: session.id == active.id,
            })
            .collect();

        let messages = active
            .messages
            .iter()
            .enumerate()
            .map(|(index, message)| MessageView::new(active.id, index, message))
            .collect();

        Self {
            school_name: profile.name.clone(),
            school_year: profile.school_year.clone(),
            sessions: links,
            session_id: active.id,
            messages,
            api_key_saved,
        }
    }
}

impl MessageView {
    /// Build the bubble for one conversation turn. Assistant turns run
    /// through the document pipeline; user turns stay plain text.
    pub fn new(session_id: Uuid, index: usize, message: &ChatMessage) -> Self {
        match message.role {
            Role::User => Self {
                role_class: "user",
                author: "Anda".to_string(),
                body_html: plain_text_html(&message.text),
                attachment_names: message
                    .attachments
                    .iter()
                    .map(|attachment| attachment.name.clone())
                    .collect(),
                exports: None,
            },
            Role::Model => {
                let document = render_service().assemble_inline(&message.text);
                Self {
                    role_class: "model",
                    author: "Asisten".to_string(),
                    body_html: document.html,
                    attachment_names: Vec::new(),
                    exports: Some(ExportLinksView {
                        word_href: format!("/sessions/{session_id}/messages/{index}/word"),
                        print_href: format!("/sessions/{session_id}/messages/{index}/print"),
                    }),
                }
            }
        }
    }
}

fn plain_text_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 16);
    for (i, line) in text.lines().enumerate() {
        if i > 0 {
            out.push_str("<br>");
        }
        for ch in line.chars() {
            match ch {
                '&' => out.push_str("&amp;"),
                '<' => out.push_str("&lt;"),
                '>' => out.push_str("&gt;"),
                '"' => out.push_str("&quot;"),
                '\'' => out.push_str("&#39;"),
                _ => out.push(ch),
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use time::OffsetDateTime;

    use super::*;

    #[test]
    fn user_turns_escape_markup_and_keep_line_breaks() {
        let message = ChatMessage::user("baris satu\n<script>", Vec::new());
        let view = MessageView::new(Uuid::new_v4(), 0, &message);
        assert_eq!(view.body_html, "baris satu<br>&lt;script&gt;");
        assert!(view.exports.is_none());
    }

    #[test]
    fn model_turns_render_through_the_pipeline_with_export_links() {
        let message = ChatMessage::model("# JUDUL\nisi");
        let session_id = Uuid::new_v4();
        let view = MessageView::new(session_id, 3, &message);
        assert!(view.body_html.contains("<h1>JUDUL</h1>"));
        let exports = view.exports.expect("model turns are exportable");
        assert_eq!(
            exports.word_href,
            format!("/sessions/{session_id}/messages/3/word")
        );
    }

    #[test]
    fn page_view_marks_the_active_session() {
        let profile = SchoolProfile {
            government_line: "PEMERINTAH".into(),
            office_line: "DINAS".into(),
            name: "SMPN 3 PACET".into(),
            address: "Pacet".into(),
            tag: "SMPN3Pacet".into(),
            principal_name: "Kepala".into(),
            principal_nip: "123".into(),
            school_year: "2025/2026".into(),
        };
        let first = ChatSession::new("a", OffsetDateTime::now_utc());
        let second = ChatSession::new("b", OffsetDateTime::now_utc());
        let sessions = vec![first.clone(), second.clone()];

        let view = ChatPageView::new(&profile, &sessions, &second, false);
        assert!(!view.sessions[0].active);
        assert!(view.sessions[1].active);
        assert_eq!(view.session_id, second.id);
    }
}
