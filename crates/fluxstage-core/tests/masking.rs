mod common;

use anyhow::Result;
use fluxstage_core::masking::{flag_summary, mask_site, mask_values, percent_retained, MaskWarning};

use common::{archive, reliable_site, site_table, with_variable};

#[test]
fn unreliable_cells_are_blanked_and_reliable_cells_kept() -> Result<()> {
    let contents = with_variable(
        archive("2002-01-01 00:30:00", 5),
        "NEE",
        vec![Some(1.5), Some(2.5), Some(3.5), Some(4.5), None],
        vec![Some(1.0), Some(0.0), Some(-9999.0), None, Some(1.0)],
    );
    let table = site_table("Amplero", &contents);

    let (masked, _) = mask_site(&table, 1.0)?;
    let values: Vec<Option<f64>> = masked.frame.column("NEE")?.f64()?.into_iter().collect();

    assert_eq!(values, vec![Some(1.5), None, None, None, None]);
    assert!(masked.frame.column("NEE_qc").is_err(), "flag columns are dropped");
    assert_eq!(masked.height(), table.height());
    Ok(())
}

#[test]
fn twenty_flagged_rows_out_of_a_hundred_retain_eighty_percent() -> Result<()> {
    let steps = 100;
    let mut contents = archive("2002-01-01 00:30:00", steps);
    let x_flags = (0..steps)
        .map(|i| Some(if i < 10 { 0.0 } else { 1.0 }))
        .collect();
    let y_flags = (0..steps)
        .map(|i| Some(if (90..100).contains(&i) { 2.0 } else { 1.0 }))
        .collect();
    contents = with_variable(contents, "X", vec![Some(1.0); steps], x_flags);
    contents = with_variable(contents, "Y", vec![Some(2.0); steps], y_flags);
    let table = site_table("Amplero", &contents);

    let (masked, report) = mask_site(&table, 1.0)?;

    assert_eq!(report.site, "Amplero");
    assert_eq!(report.total_rows, 100);
    assert_eq!(report.complete_rows, 80);
    assert_eq!(report.percent_retained, 80.0);
    assert_eq!(report.warning, None);
    assert_eq!(masked.height(), 100, "masking never drops rows");
    Ok(())
}

#[test]
fn masking_twice_with_the_same_flags_changes_nothing() {
    let values = vec![Some(1.0), Some(2.0), None, Some(4.0)];
    let flags = vec![Some(1.0), Some(0.0), Some(1.0), Some(3.0)];

    let once = mask_values(&values, &flags, 1.0);
    let twice = mask_values(&once, &flags, 1.0);

    assert_eq!(once, vec![Some(1.0), None, None, None]);
    assert_eq!(once, twice);
}

#[test]
fn custom_reliable_flag_value_is_honoured() {
    let values = vec![Some(1.0), Some(2.0)];
    let flags = vec![Some(1.0), Some(0.0)];

    assert_eq!(mask_values(&values, &flags, 0.0), vec![None, Some(2.0)]);
}

#[test]
fn fully_masked_site_warns_but_still_produces_a_table() -> Result<()> {
    let contents = with_variable(
        archive("2002-01-01 00:30:00", 3),
        "NEE",
        vec![Some(1.0); 3],
        vec![Some(0.0); 3],
    );
    let table = site_table("Amplero", &contents);

    let (masked, report) = mask_site(&table, 1.0)?;

    assert_eq!(report.warning, Some(MaskWarning::AllMasked));
    assert_eq!(report.percent_retained, 0.0);
    assert_eq!(masked.height(), 3);
    Ok(())
}

#[test]
fn percentage_is_rounded_to_two_decimals() {
    assert_eq!(percent_retained(1, 3), 33.33);
    assert_eq!(percent_retained(2, 3), 66.67);
    assert_eq!(percent_retained(0, 0), 0.0);
}

#[test]
fn flag_summary_counts_outcomes_for_one_variable() -> Result<()> {
    let contents = with_variable(
        archive("2002-01-01 00:30:00", 5),
        "NEE",
        vec![Some(1.0), None, Some(3.0), Some(4.0), Some(5.0)],
        vec![Some(1.0), Some(1.0), Some(0.0), None, Some(2.0)],
    );
    let table = site_table("Amplero", &contents);

    let summary = flag_summary(&table, "NEE", 1.0)?;
    assert_eq!(summary.reliable, 2);
    assert_eq!(summary.unreliable, 2);
    assert_eq!(summary.missing_flag, 1);
    assert_eq!(summary.missing_value, 1);

    let other = reliable_site("B", "2002-01-01 00:30:00", 2, &["Qle"]);
    assert!(flag_summary(&other, "NEE", 1.0).is_err());
    Ok(())
}
