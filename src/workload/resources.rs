//! Resource quantity parsing
//!
//! Node limits, requests and pod overhead arrive as free-form values from the
//! record. They are checked against the Kubernetes quantity grammar here so a
//! malformed value fails the pass with the offending key instead of being
//! rejected later by the API server.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::crd::{NodeResources, ResourceList};
use crate::Error;

/// Binary and decimal SI suffixes (longest first so `Ki` wins over `k`)
const SUFFIXES: &[&str] = &[
    "Ki", "Mi", "Gi", "Ti", "Pi", "Ei", "n", "u", "m", "k", "M", "G", "T", "P", "E",
];

/// Parse one resource entry into a Quantity
pub fn parse_quantity(resource: &str, value: &IntOrString) -> Result<Quantity, Error> {
    let raw = match value {
        IntOrString::Int(n) => return Ok(Quantity(n.to_string())),
        IntOrString::String(s) => s.trim(),
    };

    if raw.is_empty() {
        return Err(Error::quantity(resource, raw, "empty quantity"));
    }

    let (number, suffix) = split_suffix(raw);
    if !is_decimal(number) {
        return Err(Error::quantity(
            resource,
            raw,
            "expected a number with an optional suffix (e.g. '500m', '2', '1Gi')",
        ));
    }
    if suffix.is_empty() || SUFFIXES.contains(&suffix) {
        return Ok(Quantity(raw.to_string()));
    }
    match suffix.strip_prefix(['e', 'E']) {
        Some(exponent) if exponent.parse::<i32>().is_ok() => {}
        Some(_) => return Err(Error::quantity(resource, raw, "invalid exponent")),
        None => {
            return Err(Error::quantity(
                resource,
                raw,
                format!("unknown suffix '{}'", suffix),
            ))
        }
    }

    Ok(Quantity(raw.to_string()))
}

fn split_suffix(raw: &str) -> (&str, &str) {
    let split = raw
        .char_indices()
        .find(|(i, c)| !(c.is_ascii_digit() || *c == '.' || (*i == 0 && matches!(c, '+' | '-'))))
        .map(|(i, _)| i)
        .unwrap_or(raw.len());
    raw.split_at(split)
}

fn is_decimal(number: &str) -> bool {
    let digits = number.strip_prefix(['+', '-']).unwrap_or(number);
    !digits.is_empty()
        && digits != "."
        && digits.matches('.').count() <= 1
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
}

/// Parse a whole resource list; `None` when the list is empty
pub fn resource_list(list: &ResourceList) -> Result<Option<BTreeMap<String, Quantity>>, Error> {
    if list.is_empty() {
        return Ok(None);
    }
    list.iter()
        .map(|(name, value)| Ok((name.clone(), parse_quantity(name, value)?)))
        .collect::<Result<BTreeMap<_, _>, Error>>()
        .map(Some)
}

/// Container limits and requests for a node
pub fn container_resources(resources: &NodeResources) -> Result<ResourceRequirements, Error> {
    Ok(ResourceRequirements {
        limits: resource_list(&resources.limits)?,
        requests: resource_list(&resources.requests)?,
        ..Default::default()
    })
}
