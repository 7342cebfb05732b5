//! Shared CLI helpers — model rows, price formatting, generation output.

use colored::Colorize;

use modelgate_core::types::{Generation, ModelDescriptor, Pricing};
use modelgate_core::utils::truncate_string;

/// Longest display name shown in a model row.
const MAX_NAME_CHARS: usize = 40;

/// `✓` or `✗`, colored.
pub fn check_mark(ok: bool) -> String {
    if ok {
        "✓".green().to_string()
    } else {
        "✗".red().to_string()
    }
}

/// Price per million tokens, input / output. Unknown pricing shows as `?`.
pub fn format_price(pricing: Option<&Pricing>) -> String {
    match pricing {
        None => "?".to_string(),
        Some(p) if p.is_free() => "free".to_string(),
        Some(p) => format!(
            "${:.2} / ${:.2} per 1M",
            p.input_cost * 1_000_000.0,
            p.output_cost * 1_000_000.0
        ),
    }
}

/// One line per model: id, display name, price.
pub fn print_model_row(model: &ModelDescriptor) {
    let price = format_price(model.pricing.as_ref());
    let price = if model.is_free() {
        price.green().to_string()
    } else {
        price.dimmed().to_string()
    };
    println!(
        "  {:<48} {:<42} {}",
        model.id.bold(),
        truncate_string(&model.display_name, MAX_NAME_CHARS),
        price
    );
}

/// Print a generation result to stdout.
pub fn print_generation(generation: &Generation) {
    println!();
    if generation.content.is_empty() {
        println!("{}", "(no response)".dimmed());
    } else {
        println!("{}", generation.content);
    }
    println!();

    let meta = &generation.metadata;
    let mut footer = format!("{} · {} ms", meta.model, meta.processing_time_ms);
    if let Some(usage) = &meta.usage {
        footer.push_str(&format!(" · {} tokens", usage.total_tokens));
    }
    println!("{}", footer.dimmed());
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────
