use tera::{Context, Tera};

use crate::cookies::ID_TOKEN_COOKIE;

const AUTH_REQUIRED: &str = "auth_required.html";

lazy_static::lazy_static! {
    pub static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        if let Err(e) = tera.add_raw_template(
            AUTH_REQUIRED,
            include_str!("../templates/auth_required.html"),
        ) {
            tracing::error!("Template parsing error: {}", e);
            std::process::exit(1);
        }
        tera
    };
}

/// Page shown to browsers hitting a login-only route anonymously
pub fn render_auth_required() -> Result<String, tera::Error> {
    let mut context = Context::new();
    context.insert("cookie_name", ID_TOKEN_COOKIE);
    context.insert("login_url", "/accounts/login/");
    TEMPLATES.render(AUTH_REQUIRED, &context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_required_page_renders() {
        let html = render_auth_required().unwrap();
        assert!(html.contains("Authentication Required"));
        assert!(html.contains("id_token=&lt;token&gt;"));
        assert!(html.contains("href=\"/accounts/login/\""));
    }
}
