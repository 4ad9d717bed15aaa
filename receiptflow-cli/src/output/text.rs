//! Text output formatting with colors.

use chrono::{DateTime, Local, Utc};
use receiptflow_core::{ReceiptItem, ReceiptStatus, SplitMethod};
use receiptflow_fetch::TokenStats;
use receiptflow_pipeline::ProcessedReceipt;
use receiptflow_providers::fiscal::QrPayload;
use receiptflow_store::Config;
use std::path::Path;

// ============================================================================
// ANSI Colors
// ============================================================================

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";

/// Text formatter with optional colors.
pub struct TextFormatter {
    use_colors: bool,
    name_width: usize,
}

impl TextFormatter {
    /// Creates a new text formatter.
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            name_width: 28,
        }
    }

    /// Formats a processed receipt with its items.
    pub fn format_receipt(&self, processed: &ProcessedReceipt) -> String {
        let receipt = &processed.receipt;
        let mut lines = Vec::new();

        let merchant = receipt.merchant_name.as_deref().unwrap_or("Unknown merchant");
        lines.push(format!(
            "{} ({})",
            self.bold(merchant),
            self.format_status(receipt.status)
        ));
        if let Some(address) = &receipt.merchant_address {
            lines.push(self.dim(address));
        }

        let mut meta = format!("Receipt {} · {}", receipt.id, receipt.source.as_str());
        if let Some(at) = receipt.purchased_at {
            meta.push_str(&format!(" · {}", format_time(at)));
        }
        lines.push(self.dim(&meta));
        lines.push("─".repeat(50));

        if processed.items.is_empty() {
            lines.push(self.dim("No items"));
        }
        for item in &processed.items {
            lines.push(self.format_item(item));
        }

        lines.push("─".repeat(50));
        lines.push(format!(
            "{:<width$} {}",
            "Total",
            self.bold(&format_amount(receipt.total)),
            width = self.name_width + 17
        ));

        if let Some(error) = &receipt.last_error {
            lines.push(String::new());
            lines.push(format!("{} {}", self.red("Enrichment failed:"), error));
            lines.push(self.dim("Fiscal items were kept; run again to retry."));
        }

        lines.join("\n")
    }

    /// Formats one line item.
    fn format_item(&self, item: &ReceiptItem) -> String {
        let name = match &item.emoji {
            Some(emoji) => format!("{emoji} {}", item.display_name()),
            None => item.display_name().to_string(),
        };
        let quantity = format_quantity(item.quantity);

        let mut line = format!(
            "{:>2}. {:<width$} {:>6} x {:>9} {:>10}",
            item.position + 1,
            truncate(&name, self.name_width),
            quantity,
            format_amount(item.price),
            format_amount(item.sum),
            width = self.name_width
        );
        if item.split_method != SplitMethod::PerUnit {
            line.push_str(&format!("  {}", self.cyan(&format_split(item.split_method))));
        }
        if let Some(category) = &item.category {
            line.push_str(&format!("  {}", self.dim(category)));
        }
        line
    }

    /// Formats a parsed QR payload.
    pub fn format_qr(&self, payload: &QrPayload) -> String {
        let mut lines = vec![self.bold("Fiscal QR payload"), "─".repeat(40)];

        lines.push(format!("Device (fn):    {}", payload.fiscal_drive_number));
        lines.push(format!("Document (i):   {}", payload.fiscal_document_number));
        lines.push(format!("Signature (fp): {}", payload.fiscal_sign));
        lines.push(format!("Operation (n):  {}", payload.operation_type));

        let total = payload
            .total_minor_units()
            .map_or_else(|| self.yellow(&payload.sum), format_amount);
        lines.push(format!("Total (s):      {total}"));

        let issued = payload
            .issued_at()
            .map_or_else(|| self.yellow(&payload.timestamp), format_time);
        lines.push(format!("Issued (t):     {issued}"));

        lines.join("\n")
    }

    /// Formats the credential pool.
    pub fn format_tokens(&self, stats: &[TokenStats]) -> String {
        let mut lines = vec![
            format!(
                "{:<3} {:<14} {:<12} {:>8} {:>7}  {}",
                "",
                self.bold("Token"),
                self.bold("State"),
                self.bold("OK"),
                self.bold("Errors"),
                self.bold("Last error")
            ),
            "─".repeat(60),
        ];

        for stat in stats {
            let marker = if stat.current { "▸" } else { " " };
            let state = match (stat.disabled, stat.disabled_for_secs) {
                (true, Some(secs)) => self.red(&format!("off {secs}s")),
                (true, None) => self.red("off"),
                (false, _) if stat.error_count > 0 => self.yellow("degraded"),
                (false, _) => self.green("ok"),
            };
            lines.push(format!(
                "{:<3} {:<14} {:<12} {:>8} {:>7}  {}",
                marker,
                stat.masked,
                state,
                stat.success_count,
                stat.error_count,
                self.dim(stat.last_error.as_deref().unwrap_or("−"))
            ));
        }

        lines.join("\n")
    }

    /// Formats the effective configuration. Credentials must already be
    /// masked.
    pub fn format_config(&self, config: &Config, path: &Path) -> String {
        let mut lines = vec![
            self.bold("ReceiptFlow Configuration"),
            "─".repeat(40),
            self.dim(&format!("File: {}", path.display())),
            String::new(),
        ];

        let fiscal = &config.fiscal;
        lines.push(self.bold("Fiscal lookup"));
        lines.push(format!("  Base URL:          {}", fiscal.base_url));
        lines.push(format!("  Tokens:            {}", fiscal.tokens.join(", ")));
        lines.push(format!("  Rotation interval: {}s", fiscal.rotation_interval_secs));
        lines.push(format!("  Timeout:           {}s", fiscal.timeout_secs));
        lines.push(format!("  Max attempts:      {}", fiscal.max_attempts));
        lines.push(format!(
            "  Circuit breaker:   {} errors, {}s cooldown",
            fiscal.error_threshold, fiscal.cooldown_secs
        ));
        lines.push(String::new());

        let enrichment = &config.enrichment;
        lines.push(self.bold("Enrichment"));
        lines.push(format!("  Base URL:          {}", enrichment.base_url));
        lines.push(format!(
            "  API key:           {}",
            enrichment.api_key.as_deref().unwrap_or("−")
        ));
        lines.push(format!("  Timeout:           {}s", enrichment.timeout_secs));
        lines.push(String::new());

        lines.push(self.bold("Pipeline"));
        lines.push(format!(
            "  Error message limit: {}",
            config.pipeline.error_message_limit
        ));
        lines.push(format!("  Stream buffer:       {}", config.pipeline.stream_buffer));

        lines.join("\n")
    }

    // ========================================================================
    // Color/style helpers
    // ========================================================================

    fn format_status(&self, status: ReceiptStatus) -> String {
        match status {
            ReceiptStatus::Enriched => self.green(status.as_str()),
            ReceiptStatus::Failed => self.red(status.as_str()),
            ReceiptStatus::Pending | ReceiptStatus::Processing => self.yellow(status.as_str()),
        }
    }

    fn paint(&self, color: &str, text: &str) -> String {
        if self.use_colors {
            format!("{color}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    fn bold(&self, text: &str) -> String {
        self.paint(BOLD, text)
    }

    fn dim(&self, text: &str) -> String {
        self.paint(DIM, text)
    }

    fn green(&self, text: &str) -> String {
        self.paint(GREEN, text)
    }

    fn yellow(&self, text: &str) -> String {
        self.paint(YELLOW, text)
    }

    fn red(&self, text: &str) -> String {
        self.paint(RED, text)
    }

    fn cyan(&self, text: &str) -> String {
        self.paint(CYAN, text)
    }
}

// ============================================================================
// Value formatting
// ============================================================================

/// Formats minor units as a decimal amount: 150000 -> "1500.00".
pub fn format_amount(minor: i64) -> String {
    let sign = if minor < 0 { "-" } else { "" };
    let abs = minor.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}

/// Formats a quantity without trailing zeros: 1.0 -> "1", 0.5 -> "0.5".
pub fn format_quantity(quantity: f64) -> String {
    let text = format!("{quantity:.3}");
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn format_split(method: SplitMethod) -> String {
    method.as_str().replace('_', " ")
}

fn format_time(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}
