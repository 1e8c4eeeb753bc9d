use crate::error::{EngineError, Result};

/// Parses a size-range expression like `"1-50,60,70-80"` into a sorted,
/// deduplicated list of sizes.
pub fn parse_index_ranges(expr: &str) -> Result<Vec<usize>> {
    let mut sizes = Vec::new();
    for part in expr.split(',') {
        let part = part.trim();
        if part.is_empty() {
            return Err(EngineError::InvalidArgument(format!(
                "empty range component in {expr:?}"
            )));
        }
        match part.split_once('-') {
            None => sizes.push(parse_size(part)?),
            Some((lo, hi)) => {
                let lo = parse_size(lo)?;
                let hi = parse_size(hi)?;
                if lo > hi {
                    return Err(EngineError::InvalidArgument(format!(
                        "range {part:?} is descending"
                    )));
                }
                sizes.extend(lo..=hi);
            }
        }
    }
    sizes.sort_unstable();
    sizes.dedup();
    Ok(sizes)
}

fn parse_size(token: &str) -> Result<usize> {
    token
        .trim()
        .parse()
        .map_err(|_| EngineError::InvalidArgument(format!("bad size {token:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_values_and_ranges() {
        assert_eq!(parse_index_ranges("5").unwrap(), vec![5]);
        assert_eq!(parse_index_ranges("1-4").unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(
            parse_index_ranges("1-3,7,9-10").unwrap(),
            vec![1, 2, 3, 7, 9, 10]
        );
    }

    #[test]
    fn overlapping_ranges_deduplicate() {
        assert_eq!(parse_index_ranges("1-5,3-6").unwrap(), vec![1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_index_ranges("").is_err());
        assert!(parse_index_ranges("a-b").is_err());
        assert!(parse_index_ranges("5-1").is_err());
        assert!(parse_index_ranges("1,,2").is_err());
    }
}
