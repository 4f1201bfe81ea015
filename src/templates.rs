//! Template registry. Every template is embedded at compile time so
//! the binary carries no runtime file dependency.

use tera::Tera;

pub fn build_templates() -> Result<Tera, tera::Error> {
    let mut tera = Tera::default();
    tera.add_raw_templates(vec![
        ("base.html", include_str!("../templates/base.html")),
        ("macros.html", include_str!("../templates/macros.html")),
        ("toppage.html", include_str!("../templates/toppage.html")),
        ("home.html", include_str!("../templates/home.html")),
        ("signin.html", include_str!("../templates/signin.html")),
        ("signup.html", include_str!("../templates/signup.html")),
        ("welcome.html", include_str!("../templates/welcome.html")),
        ("profile.html", include_str!("../templates/profile.html")),
        (
            "password_change.html",
            include_str!("../templates/password_change.html"),
        ),
        (
            "password_change_done.html",
            include_str!("../templates/password_change_done.html"),
        ),
        (
            "password_reset_form.html",
            include_str!("../templates/password_reset_form.html"),
        ),
        (
            "password_reset_done.html",
            include_str!("../templates/password_reset_done.html"),
        ),
        (
            "password_reset_confirm.html",
            include_str!("../templates/password_reset_confirm.html"),
        ),
        (
            "password_reset_complete.html",
            include_str!("../templates/password_reset_complete.html"),
        ),
        (
            "password_reset_email.txt",
            include_str!("../templates/password_reset_email.txt"),
        ),
    ])?;
    Ok(tera)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tera::Context;

    #[test]
    fn test_all_templates_parse() {
        let tera = build_templates().expect("templates should parse");
        assert!(tera.get_template_names().count() >= 15);
    }

    #[test]
    fn test_base_renders_for_anonymous_and_signed_in() {
        let tera = build_templates().unwrap();

        let mut ctx = Context::new();
        ctx.insert("site_name", "Portal");
        ctx.insert("current_user", &Option::<()>::None);
        let page = tera.render("toppage.html", &ctx).unwrap();
        assert!(page.contains("Sign in"));

        let mut ctx = Context::new();
        ctx.insert("site_name", "Portal");
        ctx.insert(
            "current_user",
            &serde_json::json!({
                "id": "4ee6d2cc-0d0d-4203-b1d9-92df5975e3f5",
                "email": "me@example.com",
                "name": "Me",
            }),
        );
        let page = tera.render("toppage.html", &ctx).unwrap();
        assert!(page.contains("Sign out"));
    }
}
