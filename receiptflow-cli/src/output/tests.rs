//! CLI output formatting tests.
//!
//! These tests verify that CLI output is correctly formatted for both
//! text and JSON output modes.

#[cfg(test)]
mod text_formatter_tests {
    use super::super::text::{TextFormatter, format_amount, format_quantity};
    use receiptflow_core::{
        NewReceipt, NewReceiptItem, Receipt, ReceiptItem, ReceiptSource, ReceiptStatus, SplitMethod,
    };
    use receiptflow_fetch::TokenManager;
    use receiptflow_pipeline::ProcessedReceipt;
    use receiptflow_providers::fiscal::parse_qr_payload;
    use receiptflow_store::Config;
    use std::path::Path;

    fn processed(status: ReceiptStatus) -> ProcessedReceipt {
        let mut new = NewReceipt::new("alice", ReceiptSource::Qr, status);
        new.merchant_name = Some("Pizzeria Napoli".to_string());
        new.total = 150_000;
        let receipt = Receipt::from_new(new);

        let mut pizza = ReceiptItem::from_new(
            receipt.id,
            NewReceiptItem::plain("PIZZA MARG 30CM", 120_000, 1.0, 120_000),
        );
        pizza.name = Some("Pizza Margherita".to_string());
        pizza.emoji = Some("🍕".to_string());
        pizza.split_method = SplitMethod::ByFraction;
        let cola = ReceiptItem::from_new(
            receipt.id,
            NewReceiptItem::plain("COLA 0.5", 15_000, 2.0, 30_000).at(1),
        );

        ProcessedReceipt {
            enriched: status == ReceiptStatus::Enriched,
            receipt,
            items: vec![pizza, cola],
        }
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(150_000), "1500.00");
        assert_eq!(format_amount(5), "0.05");
        assert_eq!(format_amount(0), "0.00");
        assert_eq!(format_amount(-1_250), "-12.50");
    }

    #[test]
    fn test_format_quantity() {
        assert_eq!(format_quantity(1.0), "1");
        assert_eq!(format_quantity(0.5), "0.5");
        assert_eq!(format_quantity(1.234), "1.234");
        assert_eq!(format_quantity(10.0), "10");
    }

    #[test]
    fn test_format_enriched_receipt() {
        let formatter = TextFormatter::new(false);
        let output = formatter.format_receipt(&processed(ReceiptStatus::Enriched));

        assert!(output.contains("Pizzeria Napoli (enriched)"));
        assert!(output.contains("🍕 Pizza Margherita"));
        assert!(output.contains("by fraction"));
        assert!(output.contains("COLA 0.5"));
        assert!(output.contains("1500.00"));
        assert!(!output.contains("Enrichment failed"));
    }

    #[test]
    fn test_format_failed_receipt_shows_error() {
        let formatter = TextFormatter::new(false);
        let mut failed = processed(ReceiptStatus::Failed);
        failed.receipt.last_error = Some("service unavailable".to_string());

        let output = formatter.format_receipt(&failed);

        assert!(output.contains("(failed)"));
        assert!(output.contains("service unavailable"));
        assert!(output.contains("PIZZA") || output.contains("Pizza"));
    }

    #[test]
    fn test_colors_only_when_enabled() {
        let plain = TextFormatter::new(false).format_receipt(&processed(ReceiptStatus::Enriched));
        let colored = TextFormatter::new(true).format_receipt(&processed(ReceiptStatus::Enriched));

        assert!(!plain.contains('\x1b'));
        assert!(colored.contains("\x1b[32m"));
    }

    #[test]
    fn test_format_qr() {
        let payload =
            parse_qr_payload("t=20240115T1830&s=1500.00&fn=9999078900004792&i=12345&fp=3522207165&n=1")
                .unwrap();
        let output = TextFormatter::new(false).format_qr(&payload);

        assert!(output.contains("9999078900004792"));
        assert!(output.contains("3522207165"));
        assert!(output.contains("1500.00"));
    }

    #[test]
    fn test_format_tokens_marks_current_and_masks() {
        let tokens = TokenManager::new(vec![
            "31337.0123456789abcdef".to_string(),
            "31338.fedcba9876543210".to_string(),
        ])
        .unwrap();
        tokens.record_error("31338.fedcba9876543210", "HTTP 429");

        let output = TextFormatter::new(false).format_tokens(&tokens.stats());

        assert!(output.contains('▸'));
        assert!(!output.contains("0123456789"));
        assert!(output.contains("HTTP 429"));
        assert!(output.contains("degraded"));
    }

    #[test]
    fn test_format_config_uses_given_values() {
        let mut config = Config::default();
        config.fiscal.tokens = vec!["secret-token-123456".to_string()];
        let output =
            TextFormatter::new(false).format_config(&config.redacted(), Path::new("/tmp/config.json"));

        assert!(output.contains("/tmp/config.json"));
        assert!(output.contains("https://proverkacheka.com"));
        assert!(!output.contains("secret-token-123456"));
    }
}

#[cfg(test)]
mod json_formatter_tests {
    use super::super::json::{JsonFormatter, STREAM_END, event_line};
    use receiptflow_core::ReceiptSource;
    use receiptflow_pipeline::PipelineEvent;
    use receiptflow_providers::fiscal::parse_qr_payload;
    use serde_json::{Value, json};

    #[test]
    fn test_event_line_is_single_line() {
        let line = event_line(&PipelineEvent::Item(json!({"name": "Pizza", "tags": ["a", "b"]}))).unwrap();

        assert!(!line.contains('\n'));
        let parsed: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed["type"], "item");
        assert_eq!(parsed["data"]["name"], "Pizza");
    }

    #[test]
    fn test_stream_end_marker() {
        let parsed: Value = serde_json::from_str(STREAM_END).unwrap();
        assert_eq!(parsed, json!({"type": "stream_end"}));
    }

    #[test]
    fn test_pretty_flag() {
        let event = PipelineEvent::Started {
            source: ReceiptSource::Qr,
        };

        let compact = JsonFormatter::new(false).format(&event).unwrap();
        let pretty = JsonFormatter::new(true).format(&event).unwrap();

        assert!(!compact.contains('\n'));
        assert!(pretty.contains('\n'));
    }

    #[test]
    fn test_qr_output_derives_identity_and_total() {
        let payload =
            parse_qr_payload("t=20240115T1830&s=1500.00&fn=9999078900004792&i=12345&fp=3522207165&n=1")
                .unwrap();
        let output = JsonFormatter::new(false).format_qr(&payload).unwrap();
        let parsed: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(parsed["total"], 150_000);
        assert_eq!(parsed["payload"]["fiscal_sign"], "3522207165");
        assert_eq!(parsed["issued_at"], "2024-01-15T18:30:00+00:00");
        assert!(parsed["identity"].is_object());
    }
}
