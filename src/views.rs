use axum::{
    http::header::SET_COOKIE,
    response::{Html, IntoResponse, Response},
};
use tera::{Context, Tera};

use crate::{auth::repo_types::User, notice::Flash};

const TEMPLATES: &[(&str, &str)] = &[
    ("base.html", include_str!("../templates/base.html")),
    ("index.html", include_str!("../templates/index.html")),
    ("signup.html", include_str!("../templates/signup.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("dashboard.html", include_str!("../templates/dashboard.html")),
];

/// Compiled page templates; `.html` names are auto-escaped.
pub struct Views {
    tera: Tera,
}

impl Views {
    pub fn new() -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self { tera })
    }

    /// Render `name` with the shared layout data filled in.
    pub fn page(
        &self,
        name: &str,
        mut ctx: Context,
        current_user: Option<&User>,
        mut flash: Flash,
    ) -> Result<Page, tera::Error> {
        ctx.insert("current_user", &current_user);
        ctx.insert("notices", flash.notices());
        let html = self.tera.render(name, &ctx)?;
        Ok(Page {
            html,
            clear_notice: flash.take_clear_cookie(),
        })
    }
}

pub struct Page {
    html: String,
    clear_notice: Option<axum::http::HeaderValue>,
}

impl IntoResponse for Page {
    fn into_response(self) -> Response {
        let mut response = Html(self.html).into_response();
        if let Some(cookie) = self.clear_notice {
            response.headers_mut().append(SET_COOKIE, cookie);
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notice::Notice;
    use time::OffsetDateTime;

    fn user(bio: &str) -> User {
        User {
            id: 1,
            username: "alice".into(),
            email: "a@x.com".into(),
            password: "$argon2id$secret-hash".into(),
            bio: bio.into(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    fn render(name: &str, ctx: Context, user: Option<&User>, flash: Flash) -> String {
        let views = Views::new().expect("templates compile");
        let page = views.page(name, ctx, user, flash).expect("render");
        page.html
    }

    #[test]
    fn every_template_renders_anonymously() {
        for name in ["index.html", "signup.html", "login.html"] {
            let html = render(name, Context::new(), None, Flash::default());
            assert!(html.contains("href=\"/login\""), "{name} lacks login link");
        }
    }

    #[test]
    fn dashboard_escapes_bio_and_hides_hash() {
        let u = user("<script>alert(1)</script>");
        let mut ctx = Context::new();
        ctx.insert("user", &u);
        ctx.insert("member_since", "2026-10-19");
        let html = render("dashboard.html", ctx, Some(&u), Flash::default());
        assert!(html.contains("&lt;script&gt;"));
        assert!(!html.contains("<script>alert"));
        assert!(!html.contains("secret-hash"));
        assert!(html.contains("href=\"/logout\""));
    }

    #[test]
    fn notices_render_with_level() {
        let mut flash = Flash::default();
        flash.push(Notice::success("Profile updated!"));
        let html = render("index.html", Context::new(), None, flash);
        assert!(html.contains("notice success"));
        assert!(html.contains("Profile updated!"));
    }
}
