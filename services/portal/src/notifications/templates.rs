//! Email bodies sent by the portal

use crate::models::AdvisingStatus;

use super::Email;

const SIGNATURE: &str = "<p>Course Advising Portal</p>";

/// Login verification code
pub fn otp_email(to: &str, code: &str, ttl_minutes: i64) -> Email {
    Email::new(
        to,
        "Your Login Verification Code",
        format!(
            "<h2>Course Advising Portal</h2>\
             <p>Your one-time login code is:</p>\
             <h1>{}</h1>\
             <p>This code expires in {} minutes.</p>",
            code, ttl_minutes
        ),
    )
}

/// Password reset link
pub fn reset_email(to: &str, reset_link_base: &str, token: &str) -> Email {
    let link = format!("{}?token={}", reset_link_base, token);
    Email::new(
        to,
        "Reset Your Password",
        format!(
            "<p>Click the link below to reset your password:</p>\
             <a href=\"{link}\">{link}</a>\
             <p>This link can only be used once.</p>",
            link = link
        ),
    )
}

pub fn welcome_email(to: &str, first_name: &str) -> Email {
    Email::new(
        to,
        "Welcome to the Course Advising Portal",
        format!(
            "<h2>Welcome, {}!</h2>\
             <p>Your account has been created. Sign in to start planning your courses.</p>{}",
            escape_html(first_name),
            SIGNATURE
        ),
    )
}

/// Outcome of an advisor decision
pub fn status_email(
    to: &str,
    status: AdvisingStatus,
    term: &str,
    message: Option<&str>,
) -> Email {
    let feedback = message
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(escape_html)
        .unwrap_or_else(|| "No feedback provided.".to_string());

    Email::new(
        to,
        &format!("Advising Plan {}", status),
        format!(
            "<h2>Advising Notification</h2>\
             <p>Your advising plan has been reviewed.</p>\
             <p><strong>Term:</strong> {}</p>\
             <p><strong>Status:</strong> {}</p>\
             <p><strong>Advisor Message:</strong></p>\
             <p>{}</p><br>{}",
            escape_html(term),
            status,
            feedback,
            SIGNATURE
        ),
    )
}

fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_otp_email_contains_code() {
        let email = otp_email("a@x.com", "123456", 10);
        assert_eq!(email.to, "a@x.com");
        assert!(email.html.contains("<h1>123456</h1>"));
        assert!(email.html.contains("expires in 10 minutes"));
    }

    #[test]
    fn test_reset_email_links_token() {
        let email = reset_email("a@x.com", "https://portal.example.edu/reset.html", "tok");
        assert!(
            email
                .html
                .contains("https://portal.example.edu/reset.html?token=tok")
        );
    }

    #[test]
    fn test_status_email_defaults_feedback() {
        let email = status_email("a@x.com", AdvisingStatus::Approved, "Fall 2025", None);
        assert_eq!(email.subject, "Advising Plan Approved");
        assert!(email.html.contains("No feedback provided."));

        let blank = status_email("a@x.com", AdvisingStatus::Rejected, "Fall 2025", Some("  "));
        assert!(blank.html.contains("No feedback provided."));
    }

    #[test]
    fn test_status_email_escapes_message() {
        let email = status_email(
            "a@x.com",
            AdvisingStatus::Rejected,
            "Fall 2025",
            Some("<b>Drop CS 450</b>"),
        );
        assert!(email.html.contains("&lt;b&gt;Drop CS 450&lt;/b&gt;"));
    }
}
