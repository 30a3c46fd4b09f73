//! Outbound email.
//!
//! Handlers describe what to send as an [`EmailMessage`] and hand it to an
//! [`EmailSender`]. The only production sender is [`MockEmailService`], which
//! renders the message and writes it to the log.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
#[cfg(any(test, feature = "test-util"))]
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("failed to send email to {to}: {reason}")]
    Delivery { to: String, reason: String },
}

/// A notification email ready to be sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmailMessage {
    Welcome {
        to: String,
        first_name: String,
        last_name: String,
    },
    BookingCreated {
        to: String,
        recipient_name: String,
        booking_id: Uuid,
        service_id: Uuid,
        start_date_time: DateTime<Utc>,
        end_date_time: DateTime<Utc>,
        notes: Option<String>,
    },
    BookingCancelled {
        to: String,
        recipient_name: String,
        booking_id: Uuid,
        service_id: Uuid,
    },
}

impl EmailMessage {
    pub fn to(&self) -> &str {
        match self {
            Self::Welcome { to, .. }
            | Self::BookingCreated { to, .. }
            | Self::BookingCancelled { to, .. } => to,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "welcome",
            Self::BookingCreated { .. } => "booking_created",
            Self::BookingCancelled { .. } => "booking_cancelled",
        }
    }

    pub fn subject(&self) -> &'static str {
        match self {
            Self::Welcome { .. } => "Welcome to Our Service!",
            Self::BookingCreated { .. } => "Your booking has been confirmed!",
            Self::BookingCancelled { .. } => "Your booking has been cancelled",
        }
    }

    /// Renders the full message, subject line included.
    ///
    /// # Examples
    ///
    /// ```
    /// use notification_consumer::notification::EmailMessage;
    ///
    /// let message = EmailMessage::Welcome {
    ///     to: "jane@example.com".to_string(),
    ///     first_name: "Jane".to_string(),
    ///     last_name: "Doe".to_string(),
    /// };
    /// assert!(message.render().contains("Dear Jane Doe,"));
    /// ```
    pub fn render(&self) -> String {
        let body = match self {
            Self::Welcome {
                first_name,
                last_name,
                ..
            } => format!(
                "Dear {} {},\n\n\
                 Welcome to our appointment booking system! \
                 We're excited to have you on board.",
                first_name, last_name
            ),
            Self::BookingCreated {
                recipient_name,
                booking_id,
                service_id,
                start_date_time,
                end_date_time,
                notes,
                ..
            } => format!(
                "Dear {},\n\n\
                 Your booking has been successfully created!\n\n\
                 Booking ID: {}\n\
                 Service ID: {}\n\
                 Start Time: {}\n\
                 End Time: {}\n\
                 Notes: {}\n\n\
                 Thank you for your booking!",
                recipient_name,
                booking_id,
                service_id,
                start_date_time.format("%Y-%m-%d %H:%M"),
                end_date_time.format("%Y-%m-%d %H:%M"),
                notes.as_deref().unwrap_or("N/A")
            ),
            Self::BookingCancelled {
                recipient_name,
                booking_id,
                service_id,
                ..
            } => format!(
                "Dear {},\n\n\
                 Your booking has been cancelled as requested.\n\n\
                 Booking ID: {}\n\
                 Service ID: {}\n\n\
                 We hope to serve you again soon!",
                recipient_name, booking_id, service_id
            ),
        };

        format!(
            "Subject: {}\n\n{}\n\nBest regards,\nThe Team\n",
            self.subject(),
            body
        )
    }
}

/// Delivers notification emails.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError>;
}

/// Logs emails instead of delivering them.
#[derive(Debug, Clone, Default)]
pub struct MockEmailService;

impl MockEmailService {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailSender for MockEmailService {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        info!(
            to = %message.to(),
            kind = message.kind(),
            "[MOCK] Sending {} email",
            message.kind()
        );
        debug!(content = %message.render(), "Email content");
        info!(to = %message.to(), "Email sent");
        Ok(())
    }
}

/// Keeps sent messages in memory.
#[cfg(any(test, feature = "test-util"))]
#[derive(Debug, Clone, Default)]
pub struct RecordingEmailSender {
    sent: Arc<Mutex<Vec<EmailMessage>>>,
    failures: Arc<Mutex<usize>>,
}

#[cfg(any(test, feature = "test-util"))]
impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next(&self, count: usize) {
        if let Ok(mut failures) = self.failures.lock() {
            *failures = count;
        }
    }

    /// Messages sent so far, oldest first.
    pub fn sent(&self) -> Vec<EmailMessage> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

#[cfg(any(test, feature = "test-util"))]
#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), EmailError> {
        if let Ok(mut failures) = self.failures.lock() {
            if *failures > 0 {
                *failures -= 1;
                return Err(EmailError::Delivery {
                    to: message.to().to_string(),
                    reason: "injected failure".to_string(),
                });
            }
        }

        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}
