//! Selection spec parsing

use crate::error::{ConfigError, ConfigResult};

/// Parse an index list such as `"0,3,5-9"` (ranges inclusive)
///
/// Every index must be below `size`; this is checked before a range is
/// expanded.
pub fn parse_indices(spec: &str, size: usize) -> ConfigResult<Vec<usize>> {
    let mut out = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((lo, hi)) => {
                let lo = parse_index(lo, spec, size)?;
                let hi = parse_index(hi, spec, size)?;
                if hi < lo {
                    return Err(ConfigError::InvalidSpec(format!(
                        "descending range '{}' in '{}'", token, spec
                    )));
                }
                out.extend(lo..=hi);
            }
            None => out.push(parse_index(token, spec, size)?),
        }
    }

    if out.is_empty() {
        return Err(ConfigError::InvalidSpec(format!("empty index list '{}'", spec)));
    }
    Ok(out)
}

fn parse_index(token: &str, spec: &str, size: usize) -> ConfigResult<usize> {
    let i = token.trim().parse::<usize>()
        .map_err(|_| ConfigError::InvalidSpec(format!("bad index '{}' in '{}'", token.trim(), spec)))?;
    if i >= size {
        return Err(ConfigError::InvalidSpec(format!(
            "index {} in '{}' outside 0..{}", i, spec, size
        )));
    }
    Ok(i)
}

/// Parse a value list such as `"0,1000,2000"`
pub fn parse_values(spec: &str) -> ConfigResult<Vec<f64>> {
    let values = spec.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<f64>()
                .map_err(|_| ConfigError::InvalidSpec(format!("bad value '{}' in '{}'", t, spec)))
        })
        .collect::<ConfigResult<Vec<f64>>>()?;

    if values.is_empty() {
        return Err(ConfigError::InvalidSpec(format!("empty value list '{}'", spec)));
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_indices() {
        assert_eq!(parse_indices("0,3,5-7", 8).unwrap(), vec![0, 3, 5, 6, 7]);
        assert_eq!(parse_indices(" 2 , 4-4 ", 8).unwrap(), vec![2, 4]);
        assert!(parse_indices("3-1", 8).is_err());
        assert!(parse_indices("a,2", 8).is_err());
        assert!(parse_indices("", 8).is_err());
    }

    #[test]
    fn test_parse_indices_out_of_range() {
        assert!(parse_indices("0-8", 8).is_err());
        assert!(parse_indices("8", 8).is_err());
        let err = parse_indices("0-18446744073709551615", 8).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSpec(_)));
        assert!(err.to_string().contains("outside 0..8"), "{}", err);
    }

    #[test]
    fn test_parse_values() {
        assert_eq!(parse_values("0, 1000,2000.5").unwrap(), vec![0.0, 1000.0, 2000.5]);
        assert!(parse_values("1000,x").is_err());
    }
}
