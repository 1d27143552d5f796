//! Wire order of frame layers.
//!
//! Layers keep their declared order except checksum layers (and custom
//! layers acting as checksum) covering data `from` another layer: such a
//! layer is moved right after the layer it names. The list is rescanned
//! after every move until a scan moves nothing. A checksum reaching `until`
//! a layer stays where it is, the named layer must be the payload.

use crate::error::LayerOrderError;
use commsdsl_parse::{ChecksumInfo, LayerKind};
use std::collections::HashSet;

/// Layer attributes relevant to ordering.
#[derive(Debug, Clone, Copy)]
pub struct LayerEntry<'a> {
    pub name: &'a str,
    pub kind: LayerKind,
    /// Checksum placement, for checksum layers only.
    pub checksum: Option<&'a ChecksumInfo>,
}

/// Computed layer order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerOrder {
    /// Indices into the declared layer list, in wire order.
    pub order: Vec<usize>,
    /// Number of moves performed.
    pub splices: usize,
}

/// Computes the wire order of `layers`, given in declaration order.
///
/// # Errors
/// Fails if a checksum names an unknown layer, reaches until a layer other
/// than the payload, has no coverage, or if placement rules form a cycle.
pub fn comms_order(layers: &[LayerEntry<'_>]) -> Result<LayerOrder, LayerOrderError> {
    let mut order: Vec<usize> = (0..layers.len()).collect();
    let mut seen = HashSet::from([order.clone()]);
    let mut splices = 0;

    loop {
        let mut moved = None;
        for pos in 0..order.len() {
            if let Some(next) = place(layers, &order, pos)? {
                moved = Some((order[pos], next));
                break;
            }
        }

        let Some((layer, next)) = moved else {
            break;
        };

        if !seen.insert(next.clone()) {
            return Err(LayerOrderError::Cycle {
                layer: layers[layer].name.to_string(),
            });
        }
        order = next;
        splices += 1;
    }

    Ok(LayerOrder { order, splices })
}

/// Returns the new order if the layer at `pos` has to move.
fn place(
    layers: &[LayerEntry<'_>],
    order: &[usize],
    pos: usize,
) -> Result<Option<Vec<usize>>, LayerOrderError> {
    let entry = &layers[order[pos]];
    let Some(info) = entry.checksum else {
        return Ok(None);
    };

    let find = |target: &str| {
        order
            .iter()
            .position(|idx| layers[*idx].name == target)
            .ok_or_else(|| LayerOrderError::MissingLayer {
                layer: entry.name.to_string(),
                target: target.to_string(),
            })
    };

    if let Some(until) = &info.until {
        let target = find(until)?;
        if layers[order[target]].kind != LayerKind::Payload {
            return Err(LayerOrderError::UntilNotPayload {
                layer: entry.name.to_string(),
                target: until.clone(),
            });
        }
        return Ok(None);
    }

    let Some(from) = &info.from else {
        return Err(LayerOrderError::MissingCoverage {
            layer: entry.name.to_string(),
        });
    };

    let target = find(from)?;
    if target + 1 == pos {
        return Ok(None);
    }

    let mut next = order.to_vec();
    let layer = next.remove(pos);
    let target = if target > pos { target - 1 } else { target };
    next.insert(target + 1, layer);
    Ok(Some(next))
}

#[cfg(test)]
mod tests {
    use super::*;
    use commsdsl_parse::ChecksumAlg;

    fn from(layer: &str) -> ChecksumInfo {
        ChecksumInfo {
            alg: ChecksumAlg::Crc16,
            alg_name: String::new(),
            from: Some(layer.to_string()),
            until: None,
            verify_before_read: false,
        }
    }

    fn until(layer: &str) -> ChecksumInfo {
        ChecksumInfo {
            from: None,
            until: Some(layer.to_string()),
            ..from("")
        }
    }

    fn entry<'a>(name: &'a str, kind: LayerKind, checksum: Option<&'a ChecksumInfo>) -> LayerEntry<'a> {
        LayerEntry {
            name,
            kind,
            checksum,
        }
    }

    fn names(layers: &[LayerEntry<'_>], order: &LayerOrder) -> Vec<String> {
        order
            .order
            .iter()
            .map(|i| layers[*i].name.to_string())
            .collect()
    }

    #[test]
    fn test_already_in_place() {
        let cs = from("Id");
        let layers = [
            entry("Sync", LayerKind::Sync, None),
            entry("Size", LayerKind::Size, None),
            entry("Id", LayerKind::Id, None),
            entry("Checksum", LayerKind::Checksum, Some(&cs)),
            entry("Payload", LayerKind::Payload, None),
        ];
        let order = comms_order(&layers).expect("ordered");
        assert_eq!(order.splices, 0);
        assert_eq!(order.order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_checksum_moved_after_from_layer() {
        let cs = from("Id");
        let layers = [
            entry("Sync", LayerKind::Sync, None),
            entry("Checksum", LayerKind::Checksum, Some(&cs)),
            entry("Size", LayerKind::Size, None),
            entry("Id", LayerKind::Id, None),
            entry("Payload", LayerKind::Payload, None),
        ];
        let order = comms_order(&layers).expect("ordered");
        assert_eq!(
            names(&layers, &order),
            vec!["Sync", "Size", "Id", "Checksum", "Payload"]
        );
        assert_eq!(order.splices, 1);

        let reordered: Vec<LayerEntry<'_>> = order.order.iter().map(|i| layers[*i]).collect();
        let again = comms_order(&reordered).expect("ordered");
        assert_eq!(again.splices, 0);
        assert_eq!(names(&reordered, &again), names(&layers, &order));
    }

    #[test]
    fn test_until_must_be_payload() {
        let cs = until("Size");
        let layers = [
            entry("Sync", LayerKind::Sync, None),
            entry("Checksum", LayerKind::Checksum, Some(&cs)),
            entry("Size", LayerKind::Size, None),
            entry("Payload", LayerKind::Payload, None),
        ];
        let err = comms_order(&layers).expect_err("size is not payload");
        assert!(matches!(err, LayerOrderError::UntilNotPayload { .. }));

        let cs = until("Payload");
        let layers = [
            entry("Checksum", LayerKind::Checksum, Some(&cs)),
            entry("Size", LayerKind::Size, None),
            entry("Payload", LayerKind::Payload, None),
        ];
        let order = comms_order(&layers).expect("ordered");
        assert_eq!(order.order, vec![0, 1, 2]);
    }

    #[test]
    fn test_missing_layer_and_coverage() {
        let cs = from("Nope");
        let layers = [
            entry("Checksum", LayerKind::Checksum, Some(&cs)),
            entry("Payload", LayerKind::Payload, None),
        ];
        assert!(matches!(
            comms_order(&layers),
            Err(LayerOrderError::MissingLayer { .. })
        ));

        let cs = ChecksumInfo { from: None, ..from("") };
        let layers = [entry("Checksum", LayerKind::Custom, Some(&cs))];
        assert!(matches!(
            comms_order(&layers),
            Err(LayerOrderError::MissingCoverage { .. })
        ));
    }

    #[test]
    fn test_cycle_detected() {
        let first = from("Second");
        let second = from("First");
        let layers = [
            entry("Sync", LayerKind::Sync, None),
            entry("First", LayerKind::Checksum, Some(&first)),
            entry("Second", LayerKind::Checksum, Some(&second)),
            entry("Payload", LayerKind::Payload, None),
        ];
        assert!(matches!(
            comms_order(&layers),
            Err(LayerOrderError::Cycle { .. })
        ));
    }
}
