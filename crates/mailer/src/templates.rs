use askama::Template;

/// Plain-text part of the owner notification.
#[derive(Template)]
#[template(path = "notification.txt")]
pub struct NotificationText<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}

/// HTML part of the owner notification. Every field is escaped on render.
#[derive(Template)]
#[template(path = "notification.html")]
pub struct NotificationHtml<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub subject: &'a str,
    pub message: &'a str,
}
