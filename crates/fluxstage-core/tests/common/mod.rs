#![allow(dead_code)]

use fluxstage_reader::{build_site_table, ArchiveContents, ArchiveVariable, SiteTable};

/// Archive skeleton with grid coordinates, a time axis and site scalars.
pub fn archive(origin: &str, steps: usize) -> ArchiveContents {
    let units = format!("seconds since {origin}");
    ArchiveContents {
        variables: vec![
            ArchiveVariable::new("x", &["x"], None, vec![Some(1.0)]),
            ArchiveVariable::new("y", &["y"], None, vec![Some(1.0)]),
            ArchiveVariable::new(
                "time",
                &["time"],
                Some(units.as_str()),
                (0..steps).map(|i| Some(i as f64)).collect(),
            ),
            ArchiveVariable::new("elevation", &["y", "x"], Some("m"), vec![Some(100.0)]),
            ArchiveVariable::new("latitude", &["y", "x"], None, vec![Some(45.0)]),
            ArchiveVariable::new("longitude", &["y", "x"], None, vec![Some(10.0)]),
            ArchiveVariable::new("reference_height", &["y", "x"], Some("m"), vec![Some(3.0)]),
        ],
    }
}

pub fn with_variable(
    mut contents: ArchiveContents,
    name: &str,
    values: Vec<Option<f64>>,
    flags: Vec<Option<f64>>,
) -> ArchiveContents {
    let dims = ["time", "y", "x"];
    contents
        .variables
        .push(ArchiveVariable::new(name, &dims, None, values));
    contents.variables.push(ArchiveVariable::new(
        format!("{name}_qc"),
        &dims,
        None,
        flags,
    ));
    contents
}

/// A fully reliable site holding `variables`, each filled with a ramp.
pub fn reliable_site(site: &str, origin: &str, steps: usize, variables: &[&str]) -> SiteTable {
    let mut contents = archive(origin, steps);
    for name in variables {
        contents = with_variable(
            contents,
            name,
            (0..steps).map(|i| Some(i as f64)).collect(),
            vec![Some(1.0); steps],
        );
    }
    site_table(site, &contents)
}

pub fn site_table(site: &str, contents: &ArchiveContents) -> SiteTable {
    build_site_table(site, contents, &format!("{site}Fluxnet.nc")).expect("synthetic site table")
}
