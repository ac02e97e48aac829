//! Resource quantities
//!
//! Step resources arrive as plain strings. They are validated here before
//! being handed to the pod as `Quantity` values, and the shared-memory
//! request is split off so it can size a memory-backed volume instead.

use std::collections::BTreeMap;

use k8s_openapi::api::core::v1::ResourceRequirements;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use tracing::info;

use multistage_common::crd::StepResources;
use multistage_common::SHM_RESOURCE;

const BINARY_SUFFIXES: [(&str, f64); 6] = [
    ("Ki", 1024.0),
    ("Mi", 1_048_576.0),
    ("Gi", 1_073_741_824.0),
    ("Ti", 1_099_511_627_776.0),
    ("Pi", 1_125_899_906_842_624.0),
    ("Ei", 1_152_921_504_606_846_976.0),
];

const DECIMAL_SUFFIXES: [(&str, f64); 9] = [
    ("n", 1e-9),
    ("u", 1e-6),
    ("m", 1e-3),
    ("k", 1e3),
    ("M", 1e6),
    ("G", 1e9),
    ("T", 1e12),
    ("P", 1e15),
    ("E", 1e18),
];

/// Parse a quantity (e.g. "100m", "2Gi", "1.5", "1e3") into base units
pub fn parse_quantity(qty: &str) -> Result<f64, String> {
    let (number, multiplier) = match split_exponent(qty) {
        Some((mantissa, exponent)) => (mantissa, 10f64.powi(exponent)),
        None => BINARY_SUFFIXES
            .iter()
            .chain(DECIMAL_SUFFIXES.iter())
            .find_map(|(suffix, mult)| qty.strip_suffix(suffix).map(|n| (n, *mult)))
            .unwrap_or((qty, 1.0)),
    };

    if !is_decimal(number) {
        return Err(format!(
            "invalid quantity '{}' (expected e.g., '100m', '1', '128Mi', '1Gi', '1e3')",
            qty
        ));
    }

    number
        .parse::<f64>()
        .map(|n| n * multiplier)
        .map_err(|_| format!("invalid quantity '{}'", qty))
}

/// Mantissa and exponent of a decimal-exponent quantity such as "1.5e3".
/// A bare trailing "E" is the exa suffix, not an exponent.
fn split_exponent(qty: &str) -> Option<(&str, i32)> {
    let idx = qty.find(['e', 'E'])?;
    let (mantissa, exponent) = (&qty[..idx], &qty[idx + 1..]);
    let digits = exponent.strip_prefix(['+', '-']).unwrap_or(exponent);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    exponent.parse().ok().map(|e| (mantissa, e))
}

fn is_decimal(number: &str) -> bool {
    !number.is_empty()
        && number.chars().all(|c| c.is_ascii_digit() || c == '.')
        && number.chars().filter(|c| *c == '.').count() <= 1
        && number.chars().any(|c| c.is_ascii_digit())
}

fn quantities(
    field: &str,
    values: &BTreeMap<String, String>,
) -> Result<BTreeMap<String, Quantity>, String> {
    values
        .iter()
        .map(|(name, value)| {
            parse_quantity(value)
                .map(|_| (name.clone(), Quantity(value.clone())))
                .map_err(|e| format!("{}.{}: {}", field, name, e))
        })
        .collect()
}

/// Validate step resources and convert them to container requirements
pub fn resources_for(resources: &StepResources) -> Result<ResourceRequirements, String> {
    let requests = quantities("requests", &resources.requests)?;
    let limits = quantities("limits", &resources.limits)?;
    Ok(ResourceRequirements {
        requests: (!requests.is_empty()).then_some(requests),
        limits: (!limits.is_empty()).then_some(limits),
        ..Default::default()
    })
}

/// Split the shared-memory request off `resources`.
///
/// When a non-zero shm size is requested it is removed from both requests
/// and limits and returned; the remaining requirements go on the container.
pub fn split_shm(mut resources: ResourceRequirements) -> (ResourceRequirements, Option<Quantity>) {
    let shm = resources
        .requests
        .as_ref()
        .and_then(|r| r.get(SHM_RESOURCE))
        .filter(|q| parse_quantity(&q.0).map(|v| v > 0.0).unwrap_or(false))
        .cloned();

    if shm.is_some() {
        info!("removing shm from resources for container");
        for map in [&mut resources.requests, &mut resources.limits] {
            if let Some(m) = map.as_mut() {
                m.remove(SHM_RESOURCE);
                if m.is_empty() {
                    *map = None;
                }
            }
        }
    }

    (resources, shm)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step_resources(requests: &[(&str, &str)], limits: &[(&str, &str)]) -> StepResources {
        let to_map = |pairs: &[(&str, &str)]| {
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect()
        };
        StepResources {
            requests: to_map(requests),
            limits: to_map(limits),
        }
    }

    #[test]
    fn parses_common_quantities() {
        assert_eq!(parse_quantity("100m").unwrap(), 0.1);
        assert_eq!(parse_quantity("2").unwrap(), 2.0);
        assert_eq!(parse_quantity("1Gi").unwrap(), 1_073_741_824.0);
        assert_eq!(parse_quantity("1.5k").unwrap(), 1500.0);
        assert_eq!(parse_quantity("0").unwrap(), 0.0);
    }

    #[test]
    fn parses_exponent_quantities() {
        assert_eq!(parse_quantity("1e3").unwrap(), 1000.0);
        assert_eq!(parse_quantity("1E3").unwrap(), 1000.0);
        assert_eq!(parse_quantity("2e+2").unwrap(), 200.0);
        assert_eq!(parse_quantity("5e-1").unwrap(), 0.5);
        assert_eq!(parse_quantity("1E").unwrap(), 1e18);
        let res = resources_for(&step_resources(&[("memory", "1e9")], &[])).unwrap();
        assert_eq!(res.requests.unwrap()["memory"], Quantity("1e9".to_string()));
    }

    #[test]
    fn rejects_malformed_quantities() {
        for bad in [
            "", "abc", "1.2.3", "-1", "Gi", "10 Mi", "NaN", "inf", "e3", "1e", "1e3.5", "1e3Mi",
        ] {
            assert!(parse_quantity(bad).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn resources_for_converts_maps() {
        let res = resources_for(&step_resources(&[("cpu", "100m"), ("memory", "200Mi")], &[]))
            .unwrap();
        let requests = res.requests.unwrap();
        assert_eq!(requests["cpu"], Quantity("100m".to_string()));
        assert!(res.limits.is_none());
    }

    #[test]
    fn resources_for_names_bad_field() {
        let err = resources_for(&step_resources(&[], &[("memory", "lots")])).unwrap_err();
        assert!(err.starts_with("limits.memory:"), "{err}");
    }

    #[test]
    fn shm_is_split_from_requests_and_limits() {
        let res = resources_for(&step_resources(
            &[("cpu", "1"), (SHM_RESOURCE, "2G")],
            &[(SHM_RESOURCE, "2G")],
        ))
        .unwrap();
        let (container, shm) = split_shm(res);
        assert_eq!(shm, Some(Quantity("2G".to_string())));
        assert!(!container.requests.as_ref().unwrap().contains_key(SHM_RESOURCE));
        assert!(container.limits.is_none());
    }

    #[test]
    fn zero_shm_is_left_alone() {
        let res = resources_for(&step_resources(&[(SHM_RESOURCE, "0")], &[])).unwrap();
        let (container, shm) = split_shm(res);
        assert!(shm.is_none());
        assert!(container.requests.unwrap().contains_key(SHM_RESOURCE));
    }
}
