use std::collections::BTreeSet;

use fluxstage_reader::SiteTable;
use tracing::{debug, info};

use crate::error::{PipelineError, Result};

/// Every site projected onto the variables they all share.
#[derive(Debug, Clone)]
pub struct AlignedCorpus {
    pub variables: Vec<String>,
    pub sites: Vec<SiteTable>,
}

/// Variable names present at every site, in lexicographic order.
pub fn common_variables(sites: &[SiteTable]) -> Result<Vec<String>> {
    let mut iter = sites.iter();
    let first = iter.next().ok_or(PipelineError::EmptyCorpus)?;

    let mut common: BTreeSet<&str> = first.variable_names().collect();
    for site in iter {
        let names: BTreeSet<&str> = site.variable_names().collect();
        common.retain(|name| names.contains(name));
    }

    if common.is_empty() {
        return Err(PipelineError::NoCommonVariables);
    }
    Ok(common.into_iter().map(str::to_string).collect())
}

pub fn align_corpus(sites: &[SiteTable]) -> Result<AlignedCorpus> {
    let variables = common_variables(sites)?;
    info!(
        sites = sites.len(),
        common = variables.len(),
        variables = ?variables,
        "aligned variable sets"
    );

    let mut aligned = Vec::with_capacity(sites.len());
    for site in sites {
        let dropped: Vec<&str> = site
            .variable_names()
            .filter(|name| !variables.iter().any(|common| common == name))
            .collect();
        if !dropped.is_empty() {
            debug!(site = site.site(), dropped = ?dropped, "dropping site-specific variables");
        }
        aligned.push(site.project(&variables)?);
    }

    Ok(AlignedCorpus {
        variables,
        sites: aligned,
    })
}
