use core::ops::Range;
use hashbrown::HashMap;

use crate::{
    CarryStrategy, ConfigError, PartitionConfig, ScanAttributes, ScanNumeric, ScanPrecision,
    ScanShape, TilingConfig,
};

/// The validated work of one core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    pub core: usize,
    pub m: Range<usize>,
    pub r: Range<usize>,
    pub n: Range<usize>,
    pub tile_rows: usize,
    /// Segments actually streamed, at most one per scanned row.
    pub segments: usize,
    pub carry: CarryStrategy,
    /// Cores holding earlier rows of the same scan lanes, in scan order.
    pub upstream: Vec<usize>,
}

impl Partition {
    /// Whether the core has no element to scan.
    pub fn is_empty(&self) -> bool {
        self.m.is_empty() || self.r.is_empty() || self.n.is_empty()
    }

    /// Number of trailing totals the core publishes: one per (outer row, lane) pair.
    pub fn totals_len(&self) -> usize {
        self.m.len() * self.n.len()
    }
}

/// A [TilingConfig] checked against every requirement of the engine.
///
/// Partitions sharing the same outer and inner ranges form a group: their scanned ranges must
/// tile the axis, and each core of a group is corrected with the totals of the cores before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanPlan {
    shape: ScanShape,
    attributes: ScanAttributes,
    ub_bytes: usize,
    partitions: Vec<Partition>,
    groups: usize,
}

impl ScanPlan {
    pub fn new<P: ScanPrecision>(config: TilingConfig) -> Result<Self, ConfigError> {
        let TilingConfig {
            shape,
            attributes,
            elem,
            acc,
            ub_bytes,
            partitions,
        } = config;

        if elem != P::EI::ELEM || acc != P::EA::ELEM {
            return Err(ConfigError::ElemMismatch {
                config: elem,
                config_acc: acc,
                engine: P::EI::ELEM,
                engine_acc: P::EA::ELEM,
            });
        }

        if shape.r == 0 {
            return Err(ConfigError::EmptyScanAxis);
        }
        if shape.m == 0 {
            return Err(ConfigError::EmptyShape { dim: "outer" });
        }
        if shape.n == 0 {
            return Err(ConfigError::EmptyShape { dim: "inner" });
        }

        if partitions.is_empty() {
            return Err(ConfigError::NoCores);
        }
        if partitions.len() > shape.len() {
            return Err(ConfigError::TooManyCores {
                cores: partitions.len(),
                elems: shape.len(),
            });
        }

        for (core, partition) in partitions.iter().enumerate() {
            check_partition(core, partition, &shape)?;

            match partition.required_bytes(acc) {
                Some(required) if required <= ub_bytes => {}
                required => {
                    return Err(ConfigError::BufferTooSmall {
                        core,
                        required: required.unwrap_or(usize::MAX),
                        available: ub_bytes,
                    });
                }
            }
        }

        let groups = group_partitions(&partitions)?;
        check_groups(&groups, &partitions, &shape)?;

        let mut upstream = vec![Vec::new(); partitions.len()];
        for members in groups.values() {
            let mut order: Vec<usize> = members
                .iter()
                .copied()
                .filter(|core| !partitions[*core].r.is_empty())
                .collect();
            order.sort_by_key(|core| partitions[*core].r.start);
            if attributes.reverse {
                order.reverse();
            }

            for (position, core) in order.iter().enumerate() {
                upstream[*core] = order[..position].to_vec();
            }
        }

        let partitions = partitions
            .into_iter()
            .zip(upstream)
            .enumerate()
            .map(|(core, (partition, upstream))| {
                let segments = partition.effective_segments();
                let tile_rows = partition.effective_tile_rows();
                Partition {
                    core,
                    segments,
                    m: partition.m,
                    r: partition.r,
                    n: partition.n,
                    tile_rows,
                    carry: partition.carry,
                    upstream,
                }
            })
            .collect();

        Ok(Self {
            shape,
            attributes,
            ub_bytes,
            partitions,
            groups: groups.len(),
        })
    }

    pub fn shape(&self) -> ScanShape {
        self.shape
    }

    pub fn attributes(&self) -> ScanAttributes {
        self.attributes
    }

    pub fn ub_bytes(&self) -> usize {
        self.ub_bytes
    }

    /// Partitions indexed by core.
    pub fn partitions(&self) -> &[Partition] {
        &self.partitions
    }

    pub fn cores(&self) -> usize {
        self.partitions.len()
    }

    /// Number of groups of cores cooperating on the same scan lanes.
    pub fn groups(&self) -> usize {
        self.groups
    }

    /// Whether some core needs the totals of another one.
    pub fn propagates(&self) -> bool {
        self.partitions
            .iter()
            .any(|partition| !partition.upstream.is_empty())
    }
}

fn check_partition(
    core: usize,
    partition: &PartitionConfig,
    shape: &ScanShape,
) -> Result<(), ConfigError> {
    for (dim, range, extent) in [
        ("outer", &partition.m, shape.m),
        ("scan", &partition.r, shape.r),
        ("inner", &partition.n, shape.n),
    ] {
        if range.start > range.end || range.end > extent {
            return Err(ConfigError::PartitionOutOfBounds {
                core,
                dim,
                range: range.clone(),
                extent,
            });
        }
    }

    if partition.tile_rows == 0 {
        return Err(ConfigError::TileTooSmall {
            core,
            tile_rows: partition.tile_rows,
        });
    }
    if partition.segments == 0 {
        return Err(ConfigError::InvalidSegments { core });
    }
    if partition.carry.slots() == 0 {
        return Err(ConfigError::InvalidBuffers { core });
    }

    Ok(())
}

type GroupKey = (Range<usize>, Range<usize>);

fn group_partitions(
    partitions: &[PartitionConfig],
) -> Result<HashMap<GroupKey, Vec<usize>>, ConfigError> {
    let mut groups: HashMap<GroupKey, Vec<usize>> = HashMap::new();

    for (core, partition) in partitions.iter().enumerate() {
        if partition.is_empty() {
            continue;
        }
        groups
            .entry((partition.m.clone(), partition.n.clone()))
            .or_default()
            .push(core);
    }

    let keys: Vec<(&GroupKey, usize)> = groups
        .iter()
        .map(|(key, members)| (key, members[0]))
        .collect();
    for (index, ((m, n), first)) in keys.iter().enumerate() {
        for ((other_m, other_n), second) in &keys[index + 1..] {
            if overlaps(m, other_m) && overlaps(n, other_n) {
                return Err(ConfigError::MisalignedGroup {
                    first: *first.min(second),
                    second: *first.max(second),
                });
            }
        }
    }

    Ok(groups)
}

fn check_groups(
    groups: &HashMap<GroupKey, Vec<usize>>,
    partitions: &[PartitionConfig],
    shape: &ScanShape,
) -> Result<(), ConfigError> {
    let mut covered = 0;

    for ((m, n), members) in groups {
        let mut ordered: Vec<usize> = members
            .iter()
            .copied()
            .filter(|core| !partitions[*core].r.is_empty())
            .collect();
        ordered.sort_by_key(|core| (partitions[*core].r.start, *core));

        for pair in ordered.windows(2) {
            if partitions[pair[0]].r.end > partitions[pair[1]].r.start {
                return Err(ConfigError::PartitionOverlap {
                    first: pair[0].min(pair[1]),
                    second: pair[0].max(pair[1]),
                });
            }
        }

        let rows: usize = ordered.iter().map(|core| partitions[*core].r.len()).sum();
        covered += m.len() * rows * n.len();
    }

    match shape.len() - covered {
        0 => Ok(()),
        uncovered => Err(ConfigError::IncompleteCoverage { uncovered }),
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ElemType;

    fn config(partitions: Vec<PartitionConfig>) -> TilingConfig {
        TilingConfig::new::<f32>(
            ScanShape::new(2, 8, 4),
            ScanAttributes::inclusive(),
            usize::MAX,
            partitions,
        )
    }

    #[test]
    fn upstream_follows_the_scan_order() {
        let partitions = vec![
            PartitionConfig::new(0..2, 5..8, 0..4, 2),
            PartitionConfig::new(0..2, 0..2, 0..4, 2),
            PartitionConfig::new(0..2, 2..5, 0..4, 2),
        ];

        let plan = ScanPlan::new::<f32>(config(partitions.clone())).unwrap();
        assert_eq!(plan.partitions()[0].upstream, vec![1, 2]);
        assert_eq!(plan.partitions()[1].upstream, Vec::<usize>::new());
        assert_eq!(plan.partitions()[2].upstream, vec![1]);
        assert_eq!(plan.groups(), 1);

        let mut reversed = config(partitions);
        reversed.attributes = ScanAttributes::inclusive().with_reverse(true);
        let plan = ScanPlan::new::<f32>(reversed).unwrap();
        assert_eq!(plan.partitions()[1].upstream, vec![0, 2]);
        assert_eq!(plan.partitions()[0].upstream, Vec::<usize>::new());
    }

    #[test]
    fn independent_groups_do_not_propagate() {
        let plan = ScanPlan::new::<f32>(config(vec![
            PartitionConfig::new(0..1, 0..8, 0..4, 8),
            PartitionConfig::new(1..2, 0..8, 0..2, 8),
            PartitionConfig::new(1..2, 0..8, 2..4, 8),
        ]))
        .unwrap();

        assert_eq!(plan.groups(), 3);
        assert!(!plan.propagates());
    }

    #[test]
    fn empty_partitions_are_allowed() {
        let plan = ScanPlan::new::<f32>(config(vec![
            PartitionConfig::new(0..2, 0..8, 0..4, 8),
            PartitionConfig::new(0..2, 8..8, 0..4, 8),
            PartitionConfig::new(0..0, 0..0, 0..0, 8),
        ]))
        .unwrap();

        assert!(plan.partitions()[1].is_empty());
        assert_eq!(plan.partitions()[1].totals_len(), 8);
        assert_eq!(plan.partitions()[2].totals_len(), 0);
    }

    #[test]
    fn empty_partitions_do_not_form_groups() {
        let plan = ScanPlan::new::<i32>(TilingConfig {
            shape: ScanShape::new(2, 4, 1),
            attributes: ScanAttributes::inclusive(),
            ub_bytes: usize::MAX,
            elem: ElemType::I32,
            acc: ElemType::I32,
            partitions: vec![
                PartitionConfig::new(0..2, 0..4, 0..1, 4),
                PartitionConfig::new(0..1, 4..4, 0..1, 4),
            ],
        })
        .unwrap();

        assert_eq!(plan.groups(), 1);
        assert!(plan.partitions()[1].is_empty());
        assert!(plan.partitions()[1].upstream.is_empty());
    }

    #[test]
    fn invalid_tilings() {
        let error = |partitions| ScanPlan::new::<f32>(config(partitions)).unwrap_err();

        assert_eq!(
            error(vec![PartitionConfig::new(0..2, 0..8, 0..4, 0)]),
            ConfigError::TileTooSmall {
                core: 0,
                tile_rows: 0
            }
        );
        assert_eq!(
            error(vec![PartitionConfig::new(0..2, 0..9, 0..4, 4)]),
            ConfigError::PartitionOutOfBounds {
                core: 0,
                dim: "scan",
                range: 0..9,
                extent: 8
            }
        );
        assert_eq!(
            error(vec![
                PartitionConfig::new(0..2, 0..5, 0..4, 4),
                PartitionConfig::new(0..2, 4..8, 0..4, 4),
            ]),
            ConfigError::PartitionOverlap {
                first: 0,
                second: 1
            }
        );
        assert_eq!(
            error(vec![
                PartitionConfig::new(0..2, 0..4, 0..4, 4),
                PartitionConfig::new(0..2, 5..8, 0..4, 4),
            ]),
            ConfigError::IncompleteCoverage { uncovered: 8 }
        );
        assert_eq!(
            error(vec![
                PartitionConfig::new(0..2, 0..4, 0..4, 4),
                PartitionConfig::new(0..1, 4..8, 0..4, 4),
            ]),
            ConfigError::MisalignedGroup {
                first: 0,
                second: 1
            }
        );
        assert_eq!(error(vec![]), ConfigError::NoCores);
    }

    #[test]
    fn buffer_and_types_are_checked() {
        let partitions = vec![PartitionConfig::new(0..2, 0..8, 0..4, 8)];

        let tight = config(partitions.clone()).with_ub_bytes(64);
        assert!(matches!(
            ScanPlan::new::<f32>(tight),
            Err(ConfigError::BufferTooSmall { core: 0, .. })
        ));

        let fitted = config(partitions.clone()).with_fitted_ub_bytes();
        assert!(ScanPlan::new::<f32>(fitted).is_ok());

        let unbounded = config(vec![PartitionConfig {
            carry: CarryStrategy::Cached {
                buffers: usize::MAX,
            },
            ..PartitionConfig::new(0..2, 0..8, 0..4, 8)
        }]);
        assert_eq!(
            ScanPlan::new::<f32>(unbounded).unwrap_err(),
            ConfigError::BufferTooSmall {
                core: 0,
                required: usize::MAX,
                available: usize::MAX,
            }
        );

        let tall = config(vec![PartitionConfig::new(0..2, 0..8, 0..4, usize::MAX / 2)])
            .with_ub_bytes(1 << 20);
        let plan = ScanPlan::new::<f32>(tall).unwrap();
        assert_eq!(plan.partitions()[0].tile_rows, 8);

        assert_eq!(
            ScanPlan::new::<half::f16>(config(partitions)).unwrap_err(),
            ConfigError::ElemMismatch {
                config: ElemType::F32,
                config_acc: ElemType::F32,
                engine: ElemType::F16,
                engine_acc: ElemType::F32,
            }
        );
    }
}
