use lettre::{
    Message, SmtpTransport, Transport,
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
};
use log::{info, error, warn};

use crate::config::Config;
use crate::utils::validate_email;

/// Lifecycle notifications. Every send is best effort: failures are logged
/// and reported as `false`, never propagated to the request.
pub struct EmailService;

impl EmailService {
    pub async fn send_application_received(email: &str, hirer_name: &str, job_title: &str) -> bool {
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h2>New application on your job</h2>
                <p>Hi {},</p>
                <p>A fixer has applied to <strong>{}</strong>. Review the proposal and hire when you are ready.</p>
                <p>Best regards,<br><strong>Fixly Team</strong></p>
            </body>
            </html>
            "#,
            escape_html(hirer_name),
            escape_html(job_title)
        );
        Self::deliver(email, "New application received", body).await
    }

    pub async fn send_application_accepted(email: &str, fixer_name: &str, job_title: &str) -> bool {
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h2>You're hired! 🎉</h2>
                <p>Hi {},</p>
                <p>Your application for <strong>{}</strong> was accepted. The job is now in progress.</p>
                <p>Best regards,<br><strong>Fixly Team</strong></p>
            </body>
            </html>
            "#,
            escape_html(fixer_name),
            escape_html(job_title)
        );
        Self::deliver(email, "Your application was accepted", body).await
    }

    pub async fn send_job_marked_done(email: &str, hirer_name: &str, job_title: &str) -> bool {
        let body = format!(
            r#"
            <!DOCTYPE html>
            <html>
            <body>
                <h2>Job marked as done</h2>
                <p>Hi {},</p>
                <p>The fixer has marked <strong>{}</strong> as completed. Please confirm and leave a rating.</p>
                <p>Best regards,<br><strong>Fixly Team</strong></p>
            </body>
            </html>
            "#,
            escape_html(hirer_name),
            escape_html(job_title)
        );
        Self::deliver(email, "Please confirm job completion", body).await
    }

    pub async fn send_dispute_raised(email: &str, name: &str, job_title: &str, reason: &str) -> bool {
        let body = dispute_raised_body(name, job_title, reason);
        Self::deliver(email, "Dispute raised on your job", body).await
    }

    async fn deliver(email: &str, subject: &str, body: String) -> bool {
        match Self::try_send(email, subject, body).await {
            Ok(_) => {
                info!("Email '{}' sent to {}", subject, email);
                true
            }
            Err(e) => {
                error!("Failed to send email '{}' to {}: {}", subject, email, e);
                false
            }
        }
    }

    async fn try_send(email: &str, subject: &str, body: String) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !Config::is_mail_enabled() {
            warn!("Email credentials not configured. Skipping email send.");
            return Err("Email not configured".into());
        }
        if !validate_email(email) {
            return Err(format!("Invalid recipient address '{}'", email).into());
        }

        let from_mailbox: Mailbox = Config::mail_from().parse()?;
        let to_mailbox: Mailbox = email.parse()?;

        let email_message = Message::builder()
            .from(from_mailbox)
            .to(to_mailbox)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(body)?;

        let creds = Credentials::new(Config::mail_user(), Config::mail_password());
        let mailer = SmtpTransport::relay(&Config::mail_host())?
            .port(Config::mail_port())
            .credentials(creds)
            .build();

        // The SMTP transport blocks; keep it off the async workers.
        tokio::task::spawn_blocking(move || mailer.send(&email_message)).await??;
        Ok(())
    }
}

fn dispute_raised_body(name: &str, job_title: &str, reason: &str) -> String {
    format!(
        r#"
        <!DOCTYPE html>
        <html>
        <body>
            <h2>A dispute was raised</h2>
            <p>Hi {},</p>
            <p>A dispute was raised on <strong>{}</strong>.</p>
            <p>Reason: {}</p>
            <p>Our team will review it and get back to both parties.</p>
            <p>Best regards,<br><strong>Fixly Team</strong></p>
        </body>
        </html>
        "#,
        escape_html(name),
        escape_html(job_title),
        escape_html(reason)
    )
}

/// User-supplied text goes into the HTML bodies as text, never as markup.
fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
