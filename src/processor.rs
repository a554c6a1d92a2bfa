use anyhow::{Context, Result};
use log::{debug, error, info, warn};

use crate::gmail::Mailbox;
use crate::message::EmailRecord;
use crate::sheets::SheetSink;
use crate::store::ProcessedIds;

/// Characters of body shown per email in dry-run output
const PREVIEW_CHARS: usize = 100;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Fetch and print, never append, mark or record.
    pub dry_run: bool,
    /// Handle at most this many of the listed messages.
    pub limit: Option<usize>,
}

/// Per-run counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessingReport {
    pub found: usize,
    pub appended: usize,
    pub already_processed: usize,
    pub already_read: usize,
    pub empty: usize,
    pub failed: usize,
    /// Rows appended whose UNREAD label could not be removed
    pub mark_read_failed: usize,
}

/// The updated processed set, handed back for the caller to persist
#[derive(Debug)]
pub struct RunOutcome {
    pub processed: ProcessedIds,
    pub report: ProcessingReport,
}

/// How a single message ended up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Disposition {
    Appended,
    AlreadyRead,
    Empty,
    Previewed,
}

pub struct EmailProcessor<M: Mailbox, S: SheetSink> {
    mailbox: M,
    sheet: S,
    options: RunOptions,
}

impl<M: Mailbox, S: SheetSink> EmailProcessor<M, S> {
    pub fn new(mailbox: M, sheet: S, options: RunOptions) -> Self {
        EmailProcessor {
            mailbox,
            sheet,
            options,
        }
    }

    /// Append one row per new unread email and return the grown set.
    ///
    /// Listing failures abort the run. Failures on a single email are logged
    /// and the run moves on to the next one.
    pub async fn run(&self, mut processed: ProcessedIds) -> Result<RunOutcome> {
        let is_dry_run = self.options.dry_run;
        let mut report = ProcessingReport::default();

        if is_dry_run {
            println!("\n{}", "=".repeat(80));
            println!("🧪 MODE DRY-RUN - UNREAD EMAILS");
            println!("{}", "=".repeat(80));
        }

        let message_ids = self
            .mailbox
            .list_unread_ids()
            .await
            .context("Failed to list unread emails")?;

        if message_ids.is_empty() {
            if is_dry_run {
                println!("✅ No unread emails");
            } else {
                info!("No unread emails to process");
            }
            return Ok(RunOutcome { processed, report });
        }

        let emails_to_process: Vec<String> = match self.options.limit {
            Some(limit) => message_ids.into_iter().take(limit).collect(),
            None => message_ids,
        };
        report.found = emails_to_process.len();

        for (index, message_id) in emails_to_process.iter().enumerate() {
            if processed.contains(message_id) {
                info!("Skipping already processed email: {}", message_id);
                report.already_processed += 1;
                continue;
            }

            if is_dry_run {
                println!("📧 Email {}/{} (ID: {})", index + 1, emails_to_process.len(), message_id);
                println!("{}", "-".repeat(60));
            }

            match self.process_single_email(message_id, &mut processed, &mut report).await {
                Ok(Disposition::Appended) => report.appended += 1,
                Ok(Disposition::AlreadyRead) => report.already_read += 1,
                Ok(Disposition::Empty) => report.empty += 1,
                Ok(Disposition::Previewed) => {}
                Err(e) => {
                    report.failed += 1;
                    if is_dry_run {
                        println!("❌ Error reading email {}: {:#}\n", message_id, e);
                    } else {
                        error!("Error processing email {}: {:#}", message_id, e);
                    }
                }
            }
        }

        if is_dry_run {
            println!("{}", "=".repeat(80));
            println!(
                "🏁 {} unread email(s), {} already processed, nothing written",
                report.found, report.already_processed
            );
            println!("{}", "=".repeat(80));
        } else {
            info!(
                "Processing completed: {} appended, {} already processed, {} already read, {} empty, {} failed",
                report.appended, report.already_processed, report.already_read, report.empty, report.failed
            );
        }

        Ok(RunOutcome { processed, report })
    }

    async fn process_single_email(
        &self,
        message_id: &str,
        processed: &mut ProcessedIds,
        report: &mut ProcessingReport,
    ) -> Result<Disposition> {
        let message = self
            .mailbox
            .fetch_message(message_id)
            .await
            .context("Unable to fetch message")?;

        if !message.is_unread() {
            info!("Email {} was read since listing, skipping", message_id);
            return Ok(Disposition::AlreadyRead);
        }

        let record = EmailRecord::from_message(&message);
        if record.is_empty() {
            warn!("No data extracted from email {}, skipping", message_id);
            return Ok(Disposition::Empty);
        }

        if self.options.dry_run {
            print_record(&record);
            return Ok(Disposition::Previewed);
        }

        let row = record.to_row();
        let summary = self
            .sheet
            .append_row(&row)
            .await
            .context("Unable to append row to the spreadsheet")?;

        // Recorded before marking read: a failed mark must not lead to a second row.
        processed.insert(message_id);
        info!("Appended email from {} to Google Sheet ({})", row[0], summary.updated_range);

        match self.mailbox.mark_as_read(message_id).await {
            Ok(()) => debug!("Marked email {} as read", message_id),
            Err(e) => {
                report.mark_read_failed += 1;
                error!("Row appended but failed to mark email {} as read: {}", message_id, e);
            }
        }

        Ok(Disposition::Appended)
    }
}

fn print_record(record: &EmailRecord) {
    let row = record.to_row();
    println!("👤 From:    {}", row[0]);
    println!("📝 Subject: {}", row[1]);
    println!("📅 Date:    {}", row[2]);
    println!("📄 Body:    {}", record.preview(PREVIEW_CHARS));
    println!();
}
