//! Output formatting module

use parcel_types::{
    ConditionRecord, DimensionMeasurement, OutputFormat, PhotoAnalysis, Result,
};

fn print_measurement(m: &DimensionMeasurement) {
    println!(
        "Dimensions:      {:.0} x {:.0} x {:.0} mm",
        m.length_mm, m.width_mm, m.height_mm
    );
    println!("Dim. weight:     {:.2} kg", m.dim_weight_kg);
    println!("Confidence:      {:.0}%", m.confidence * 100.0);
    println!("Source:          {}", m.source.label());
}

pub fn output_analysis(output_format: OutputFormat, analysis: &PhotoAnalysis) -> Result<()> {
    if output_format == OutputFormat::Json {
        let content = serde_json::to_string_pretty(analysis)?;
        println!("{}", content);
        return Ok(());
    }

    println!("\nPhoto Analysis");
    println!("==============");
    println!(
        "Quality gate:    {}",
        if analysis.quality.quality_passed {
            "Passed"
        } else {
            "Failed"
        }
    );
    for deficiency in &analysis.quality.deficiencies {
        let marker = if deficiency.is_blocking() { "✗" } else { "!" };
        println!("  {} {}", marker, deficiency);
    }

    println!("\n--- Photo Quality ---");
    println!(
        "Front:           blur {:.0}, exposure {:.0}",
        analysis.front.blur_score, analysis.front.exposure_score
    );
    println!(
        "Side:            blur {:.0}, exposure {:.0}",
        analysis.side.blur_score, analysis.side.exposure_score
    );
    println!(
        "Marker:          {} ({:.0}%)",
        if analysis.ruler.is_detected() {
            "detected"
        } else {
            "not found"
        },
        analysis.ruler.confidence * 100.0
    );
    if analysis.ruler.is_detected() {
        println!(
            "Scale:           {:.2} px/mm{}",
            analysis.ruler.pixels_per_mm,
            if analysis.ruler.perspective_corrected {
                " (perspective corrected)"
            } else {
                ""
            }
        );
    }
    println!("---------------------");

    print_measurement(&analysis.measurement);
    Ok(())
}

pub fn output_record(output_format: OutputFormat, record: &ConditionRecord) -> Result<()> {
    if output_format == OutputFormat::Json {
        let content = serde_json::to_string_pretty(record)?;
        println!("{}", content);
        return Ok(());
    }

    println!("\nCondition Record");
    println!("================");
    println!("Record:          {}", record.id);
    println!("Order:           {}", record.order_id);
    println!("Event:           {}", record.event_type);
    println!(
        "Recorded:        {} by {} at {}",
        record.timestamp.format("%Y-%m-%d %H:%M"),
        record.staff_id,
        record.warehouse_id
    );
    if let Some(weight) = record.actual_weight_kg {
        println!("Actual weight:   {:.2} kg", weight);
    }
    if let Some(ref courier) = record.courier {
        println!("Courier:         {}", courier);
    }

    println!("\n--- Measurement ---");
    match record.dimension_measurement {
        Some(ref m) => print_measurement(m),
        None => println!("(pending)"),
    }

    if let Some(ref comparison) = record.comparison {
        println!("\n--- Arrival Comparison ---");
        println!("Arrival record:  {}", comparison.arrival_condition_id);
        println!("Similarity:      {:.2}", comparison.ssim_score);
        println!("Alignment:       {:.2}", comparison.alignment_score);
        println!(
            "Change detected: {}",
            if comparison.change_detected { "Yes" } else { "No" }
        );
        for area in &comparison.changed_areas {
            println!(
                "  {:<20} {:?} ({:.0}%)",
                area.area,
                area.change_type,
                area.confidence * 100.0
            );
        }
        println!("Source:          {}", comparison.source.label());
    }

    println!("\n--- Damage ---");
    match record.damage {
        Some(ref damage) => {
            println!("Condition:       {}", damage.final_assessment.label());
            if !damage.confirmed_tags.is_empty() {
                let tags: Vec<&str> = damage.confirmed_tags.iter().map(|t| t.label()).collect();
                println!("Tags:            {}", tags.join(", "));
            }
            if let Some(ref notes) = damage.notes {
                println!("Notes:           {}", notes);
            }
            println!(
                "Confirmed:       {} at {}",
                damage.confirmed_by,
                damage.confirmed_at.format("%Y-%m-%d %H:%M")
            );
        }
        None => println!("(not confirmed)"),
    }

    if record.flagged_for_review {
        match record.review {
            Some(ref review) => println!(
                "\nReview:          {:?} by {}{}",
                review.outcome,
                review.resolved_by,
                review
                    .notes
                    .as_deref()
                    .map(|n| format!(" ({})", n))
                    .unwrap_or_default()
            ),
            None => println!("\n⚠ Flagged for review"),
        }
    }

    Ok(())
}

pub fn output_records(output_format: OutputFormat, records: &[ConditionRecord]) -> Result<()> {
    if output_format == OutputFormat::Json {
        let content = serde_json::to_string_pretty(records)?;
        println!("{}", content);
        return Ok(());
    }

    if records.is_empty() {
        println!("No records found.");
        return Ok(());
    }

    println!(
        "{:<38} {:<14} {:<9} {:>16} {:>8} {:<8} {:>11}",
        "Record", "Order", "Event", "L x W x H (mm)", "Dim.kg", "Damage", "Date"
    );
    println!("{}", "-".repeat(110));

    for record in records {
        let order = if record.order_id.chars().count() > 14 {
            format!("{}...", record.order_id.chars().take(11).collect::<String>())
        } else {
            record.order_id.clone()
        };

        let (dims, dim_weight) = match record.dimension_measurement {
            Some(ref m) => (
                format!("{:.0}x{:.0}x{:.0}", m.length_mm, m.width_mm, m.height_mm),
                format!("{:.2}", m.dim_weight_kg),
            ),
            None => ("-".to_string(), "-".to_string()),
        };

        let damage = record
            .damage
            .as_ref()
            .map(|d| d.final_assessment.label())
            .unwrap_or("-");

        let flag = if record.awaiting_review() { " ⚠" } else { "" };

        println!(
            "{:<38} {:<14} {:<9} {:>16} {:>8} {:<8} {:>11}{}",
            record.id,
            order,
            record.event_type.to_string(),
            dims,
            dim_weight,
            damage,
            record.timestamp.format("%m/%d %H:%M").to_string(),
            flag
        );
    }

    Ok(())
}
