use crate::config::{load_preset, save_preset, EngineConfig};
use crate::core::extract::{extract_rows, merge_return, project_line_items};
use crate::core::mapping::{preset_from_mapping, select_sheet, SheetSelection};
use crate::core::{aggregate, profile_sheet, propose_mapping, resolve_saved_mapping, summarize};
use crate::error::{ReconError, ReconResult};
use crate::excel::{build_layout, ExcelExporter, ExcelImporter};
use crate::parser;
use crate::types::{
    Column, ColumnMapping, CompanyRoundIdentity, ComparisonRow, ConfigScope, Dataset,
    SavedImportConfig, Sheet,
};
use crate::writer;
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Format a number for display, removing unnecessary decimal places
fn format_number(n: f64) -> String {
    let rounded = (n * 100.0).round() / 100.0;
    format!("{:.2}", rounded)
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

fn format_opt(value: Option<f64>) -> String {
    value.map(format_number).unwrap_or_else(|| "-".to_string())
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(1)).collect();
        format!("{}…", cut)
    }
}

//==============================================================================
// Sheet mapping shared by import and add-return
//==============================================================================

/// A sheet read from a workbook with the mapping that will be applied to it.
struct MappedSheet {
    sheet: Sheet,
    columns: Vec<Column>,
    mapping: ColumnMapping,
}

fn pick_sheet(
    importer: &ExcelImporter,
    sheet: Option<&str>,
    preset: Option<&SavedImportConfig>,
) -> ReconResult<Sheet> {
    if let Some(name) = sheet {
        return importer.read_sheet(name);
    }
    let Some(preset) = preset else {
        return importer.read_sheet_or_first(None);
    };

    let names = importer.sheet_names()?;
    match select_sheet(preset, &names) {
        SheetSelection::Found(name) => importer.read_sheet(&name),
        SheetSelection::Pending(pending) => Err(ReconError::SheetNotFound(format!(
            "preset '{}' expects sheet '{}' (available: {})",
            preset.name,
            pending.requested,
            names.join(", ")
        ))),
        SheetSelection::Unspecified => importer.read_sheet_or_first(None),
    }
}

fn map_sheet(
    input: &Path,
    sheet: Option<&str>,
    preset: Option<&SavedImportConfig>,
    config: &EngineConfig,
    verbose: bool,
) -> ReconResult<MappedSheet> {
    let importer = ExcelImporter::new(input);
    let sheet = pick_sheet(&importer, sheet, preset)?;

    let profile = profile_sheet(&sheet, &config.profile_options());
    let proposal = propose_mapping(&sheet.name, &profile, &config.criteria);

    let mapping = match preset {
        Some(preset) => {
            let resolved = resolve_saved_mapping(preset, &profile.columns, proposal.mapping);
            for reference in &resolved.unresolved {
                println!(
                    "   {} preset column '{}' not found, using it as a literal key",
                    "⚠️".yellow(),
                    reference.yellow()
                );
            }
            resolved.mapping
        }
        None => proposal.mapping,
    };

    for key in mapping.missing_keys(&profile.columns) {
        warn!(key = %key, sheet = %sheet.name, "mapped column not present on sheet");
    }
    mapping.require_complete()?;

    if verbose {
        println!(
            "   Sheet '{}', header row {}, {} columns",
            sheet.name,
            mapping.header_row + 1,
            profile.columns.len()
        );
        print_mapping(&mapping);
    }

    Ok(MappedSheet {
        sheet,
        columns: profile.columns,
        mapping,
    })
}

fn print_mapping(mapping: &ColumnMapping) {
    let show = |keys: &[String]| {
        if keys.is_empty() {
            "-".dimmed().to_string()
        } else {
            keys.join(", ").bright_blue().to_string()
        }
    };
    let show_one = |key: &Option<String>| match key {
        Some(k) => k.bright_blue().to_string(),
        None => "-".dimmed().to_string(),
    };
    println!("   code:        {}", show(&mapping.code_columns));
    println!("   description: {}", show(&mapping.description_columns));
    println!("   price:       {}", show_one(&mapping.price_column));
    println!("   quantity:    {}", show_one(&mapping.quantity_column));
    println!("   progressive: {}", show_one(&mapping.progressive_column));
}

//==============================================================================
// Commands
//==============================================================================

/// Execute the profile command
pub fn profile(input: PathBuf, sheet: Option<String>, config: &EngineConfig, json: bool) -> ReconResult<()> {
    let importer = ExcelImporter::new(&input);
    let sheet = importer.read_sheet_or_first(sheet.as_deref())?;
    let profile = profile_sheet(&sheet, &config.profile_options());
    let proposal = propose_mapping(&sheet.name, &profile, &config.criteria);

    if json {
        let out = serde_json::json!({
            "sheet": sheet.name,
            "header_row": profile.header.row,
            "columns": profile.columns,
            "mapping": proposal.mapping,
            "explanation": proposal.explanation,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "📋 Bid Recon - Sheet Profile".bold().green());
    println!("   File:  {}", input.display());
    println!("   Sheet: {}", sheet.name);
    println!(
        "   Header row: {} ({:?})\n",
        profile.header.row + 1,
        profile.header.matched_by
    );

    if profile.columns.is_empty() {
        println!("{}", "   No columns detected; map this sheet manually.".yellow());
        return Ok(());
    }

    println!(
        "{:<5} {:<28} {:>8} {:>8} {:>8} {:>8}  {}",
        "Key".bold(),
        "Label".bold(),
        "Numeric".bold(),
        "Currency".bold(),
        "Text".bold(),
        "Code".bold(),
        "Samples".bold()
    );
    println!("{}", "─".repeat(100));
    for c in &profile.columns {
        println!(
            "{:<5} {:<28} {:>8.2} {:>8.2} {:>8.2} {:>8.2}  {}",
            c.key.bright_blue(),
            truncate(&c.label, 28),
            c.numeric_score,
            c.currency_score,
            c.text_score,
            c.code_score,
            truncate(&c.samples.join(" | "), 40).dimmed()
        );
    }
    println!("{}", "─".repeat(100));

    println!("\n{}", "🧭 Proposed mapping:".bold().cyan());
    for choice in &proposal.explanation {
        match &choice.choice {
            Some(c) => {
                let runner = choice
                    .runner_up
                    .as_ref()
                    .map(|r| format!(" (next: {} {:.2})", r.key, r.score))
                    .unwrap_or_default();
                println!(
                    "   {:<12} {} \"{}\" score {:.2}{}",
                    choice.role.to_string(),
                    c.key.bright_blue().bold(),
                    c.label,
                    c.score,
                    runner.dimmed()
                );
            }
            None => println!("   {:<12} {}", choice.role.to_string(), "-".dimmed()),
        }
    }

    if let Err(e) = proposal.mapping.require_complete() {
        println!("\n   {} {}", "⚠️".yellow(), e.to_string().yellow());
    }

    Ok(())
}

/// Execute the import command: project estimate → new dataset
#[allow(clippy::too_many_arguments)]
pub fn import(
    input: PathBuf,
    output: PathBuf,
    name: Option<String>,
    project: Option<String>,
    sheet: Option<String>,
    preset: Option<PathBuf>,
    config: &EngineConfig,
    verbose: bool,
) -> ReconResult<()> {
    println!("{}", "📥 Bid Recon - Project Import".bold().green());
    println!("   Input:  {}", input.display());
    println!("   Output: {}\n", output.display());

    let preset = preset.as_deref().map(load_preset).transpose()?;
    let mapped = map_sheet(&input, sheet.as_deref(), preset.as_ref(), config, verbose)?;
    let rows = extract_rows(&mapped.sheet, &mapped.mapping);

    let dataset_name = name.unwrap_or_else(|| {
        input
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("dataset")
            .to_string()
    });
    let mut dataset = Dataset::new(dataset_name);
    dataset.project = project;
    dataset.line_items = project_line_items(&rows);

    writer::write_dataset(&output, &dataset)?;

    println!("{}", "✅ Import Complete!".bold().green());
    println!("   Line items: {}", dataset.line_items.len().to_string().bold());
    println!("   Dataset:    {}\n", output.display());
    Ok(())
}

/// Options for attaching one bid return to a dataset.
#[derive(Debug, Clone, Default)]
pub struct ReturnOptions {
    pub company: String,
    pub round: Option<u32>,
    pub sheet: Option<String>,
    pub preset: Option<PathBuf>,
    /// Write the mapping used as a preset at this path.
    pub save_preset: Option<PathBuf>,
    pub preset_name: Option<String>,
    pub scope: ConfigScope,
}

/// Execute the add-return command: bid return → offers on an existing dataset
pub fn add_return(
    dataset_path: PathBuf,
    input: PathBuf,
    options: ReturnOptions,
    config: &EngineConfig,
    verbose: bool,
) -> ReconResult<()> {
    let identity = CompanyRoundIdentity::new(&options.company, options.round);
    println!("{}", "📥 Bid Recon - Add Bid Return".bold().green());
    println!("   Dataset: {}", dataset_path.display());
    println!("   Return:  {}", input.display());
    println!("   Offer:   {}\n", identity.company_name.bright_yellow().bold());

    let mut dataset = parser::parse_dataset(&dataset_path)?;

    // Validate the preset save before touching anything on disk.
    let new_preset = match &options.save_preset {
        Some(_) => {
            let draft = SavedImportConfig {
                name: options
                    .preset_name
                    .clone()
                    .unwrap_or_else(|| options.company.clone()),
                company: Some(options.company.clone()),
                scope: options.scope,
                ..Default::default()
            };
            draft.validate_for_save(dataset.project.as_deref())?;
            Some(draft)
        }
        None => None,
    };

    let preset = options.preset.as_deref().map(load_preset).transpose()?;
    let mapped = map_sheet(&input, options.sheet.as_deref(), preset.as_ref(), config, verbose)?;
    let rows = extract_rows(&mapped.sheet, &mapped.mapping);

    let report = merge_return(&mut dataset.line_items, &rows, &identity.company_name);
    dataset.add_company(identity);
    writer::write_dataset(&dataset_path, &dataset)?;

    if let (Some(path), Some(draft)) = (&options.save_preset, new_preset) {
        let mut preset = preset_from_mapping(&draft.name, &mapped.mapping, &mapped.columns);
        preset.company = draft.company;
        preset.scope = draft.scope;
        save_preset(path, &preset, dataset.project.as_deref())?;
        println!("   Preset saved: {}", path.display());
    }

    println!("{}", "✅ Return Added!".bold().green());
    println!("   Matched lines: {}", report.matched.to_string().green());
    if !report.unmatched.is_empty() {
        println!(
            "   {} {} return rows have no project line:",
            "⚠️".yellow(),
            report.unmatched.len().to_string().yellow()
        );
        for row in report.unmatched.iter().take(10) {
            println!("      {}", row.dimmed());
        }
    }
    println!();
    Ok(())
}

/// Company-rounds in scope: all, or those whose name matches a filter (case-insensitive).
fn companies_in_scope(dataset: &Dataset, filter: &[String]) -> ReconResult<Vec<CompanyRoundIdentity>> {
    if filter.is_empty() {
        return Ok(dataset.companies.clone());
    }
    let mut selected = Vec::new();
    for wanted in filter {
        let wanted_lc = wanted.trim().to_lowercase();
        let found: Vec<_> = dataset
            .companies
            .iter()
            .filter(|c| c.company_name.to_lowercase() == wanted_lc)
            .cloned()
            .collect();
        if found.is_empty() {
            let available: Vec<_> = dataset.companies.iter().map(|c| &c.company_name).collect();
            return Err(ReconError::Config(format!(
                "Company '{}' not found. Available: {:?}",
                wanted, available
            )));
        }
        selected.extend(found);
    }
    Ok(selected)
}

fn print_comparison(rows: &[ComparisonRow<'_>], companies: &[CompanyRoundIdentity]) {
    let width = 42 + 12 * 3 + companies.len() * 14;
    println!("\n{}", "📊 Price Comparison:".bold().cyan());
    println!("{}", "─".repeat(width));

    print!("{:<12}{:<30}{:>12}", "Code".bold(), "Description".bold(), "Project".bold());
    for c in companies {
        print!("{:>14}", truncate(&c.company_name, 13).bright_yellow().bold());
    }
    println!("{:>12}{:>12}", "Mean".bold(), "Std Dev".bold());
    println!("{}", "─".repeat(width));

    for row in rows {
        print!(
            "{:<12}{:<30}{:>12}",
            truncate(&row.item.code, 11).bright_blue(),
            truncate(&row.item.description, 29),
            format_opt(row.item.project_unit_price)
        );
        for c in &row.companies {
            let text = format_opt(c.unit_price);
            let cell = match c.delta_vs_project_pct {
                Some(d) if d < 0.0 => text.green(),
                Some(d) if d > 0.0 => text.red(),
                _ if c.unit_price.is_none() => text.dimmed(),
                _ => text.normal(),
            };
            print!("{:>14}", cell);
        }
        print!(
            "{:>12}{:>12}",
            format_opt(row.mean_price()),
            format_opt(row.stddev_price())
        );
        if row.has_quantity_mismatch {
            print!("  {}", "⚠️ qty".yellow());
        }
        println!();
    }
    println!("{}", "─".repeat(width));
}

/// Execute the compare command
pub fn compare(dataset_path: PathBuf, companies: Vec<String>, json: bool) -> ReconResult<()> {
    let dataset = parser::parse_dataset(&dataset_path)?;
    let scope = companies_in_scope(&dataset, &companies)?;
    let rows = aggregate(&dataset.line_items, &scope);
    let summary = summarize(&rows, &scope);

    if json {
        let out = serde_json::json!({
            "dataset": dataset.name,
            "rows": rows,
            "summary": summary,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", "📊 Bid Recon - Comparison".bold().green());
    println!("   Dataset: {}", dataset_path.display());
    println!(
        "   Companies: {}",
        scope
            .iter()
            .map(|c| c.company_name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
            .bright_yellow()
            .bold()
    );

    print_comparison(&rows, &scope);

    println!("\n{}", "🧾 Totals:".bold().cyan());
    println!(
        "   {:<30} {:>14}",
        "Project estimate",
        format_number(summary.project_total)
    );
    for totals in &summary.companies {
        let missing = if totals.missing_items > 0 {
            format!(" ({} lines not priced)", totals.missing_items)
                .yellow()
                .to_string()
        } else {
            String::new()
        };
        println!(
            "   {:<30} {:>14}{}",
            truncate(&totals.company_name, 30),
            format_number(totals.total_amount),
            missing
        );
    }

    println!();
    println!(
        "   Rows: {}  Priced: {}  {} Quantity mismatches: {}",
        summary.rows,
        summary.priced_rows.to_string().green(),
        "⚠️".yellow(),
        summary.quantity_mismatch_rows.to_string().yellow()
    );
    match &summary.lowest_bidder {
        Some(name) => println!("   Lowest complete bid: {}", name.bold().green()),
        None => println!("   Lowest complete bid: {}", "none".dimmed()),
    }
    println!();
    Ok(())
}

/// Execute the export command
pub fn export(
    dataset_path: PathBuf,
    output: PathBuf,
    companies: Vec<String>,
    config: &EngineConfig,
    verbose: bool,
) -> ReconResult<()> {
    println!("{}", "📤 Bid Recon - Excel Export".bold().green());
    println!("   Dataset: {}", dataset_path.display());
    println!("   Output:  {}\n", output.display());

    let dataset = parser::parse_dataset(&dataset_path)?;
    let scope = companies_in_scope(&dataset, &companies)?;

    if verbose {
        println!(
            "   Found {} line items, {} company-rounds\n",
            dataset.line_items.len(),
            scope.len()
        );
    }

    let rows = aggregate(&dataset.line_items, &scope);
    let layout = build_layout(&rows, &scope, &config.export_options());
    ExcelExporter::new(layout).export(&output)?;

    println!("{}", "✅ Export Complete!".bold().green());
    println!("   Excel file: {}\n", output.display());
    Ok(())
}
