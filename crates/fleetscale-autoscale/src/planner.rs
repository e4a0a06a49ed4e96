//! MembershipPlanner — target membership for a scaling decision.

use fleetscale_core::{FleetConfig, ScalingDecision};

/// Derives the next membership from the current one.
#[derive(Debug, Clone)]
pub struct MembershipPlanner {
    fleet: FleetConfig,
}

impl MembershipPlanner {
    /// Planner over the fleet's canonical address block and maximum size.
    pub fn new(fleet: FleetConfig) -> Self {
        Self { fleet }
    }

    /// Target membership, or `None` for `NoAction`.
    ///
    /// Scale-out ignores the current addresses and returns the canonical
    /// block of `len + 1` members (capped at the maximum), so any drift
    /// from the block is overwritten. Scale-in drops the last member.
    pub fn plan(&self, decision: ScalingDecision, current: &[String]) -> Option<Vec<String>> {
        match decision {
            ScalingDecision::ScaleOut => {
                let count = current.len() as u32 + 1;
                Some(
                    self.fleet
                        .canonical_block(count.min(self.fleet.max_instances)),
                )
            }
            ScalingDecision::ScaleIn => {
                let mut next = current.to_vec();
                next.pop();
                Some(next)
            }
            ScalingDecision::NoAction => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> MembershipPlanner {
        MembershipPlanner::new(FleetConfig::default())
    }

    fn ips(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn scale_out_yields_next_contiguous_block() {
        let fleet = FleetConfig::default();
        for n in fleet.min_instances..fleet.max_instances {
            let current = fleet.canonical_block(n);
            let next = planner().plan(ScalingDecision::ScaleOut, &current).unwrap();
            assert_eq!(next.len() as u32, n + 1);
            assert_eq!(next, fleet.canonical_block(n + 1));
        }
    }

    #[test]
    fn scale_out_from_two() {
        let next = planner()
            .plan(ScalingDecision::ScaleOut, &ips(&["10.2.22.21", "10.2.22.22"]))
            .unwrap();
        assert_eq!(next, ips(&["10.2.22.21", "10.2.22.22", "10.2.22.23"]));
    }

    #[test]
    fn scale_out_overwrites_drifted_membership() {
        let current = ips(&["10.2.22.40", "10.2.22.41"]);
        let next = planner().plan(ScalingDecision::ScaleOut, &current).unwrap();
        assert_eq!(next, ips(&["10.2.22.21", "10.2.22.22", "10.2.22.23"]));
    }

    #[test]
    fn scale_out_is_capped_at_max() {
        let current = FleetConfig::default().canonical_block(5);
        let next = planner().plan(ScalingDecision::ScaleOut, &current).unwrap();
        assert_eq!(next.len(), 5);
    }

    #[test]
    fn scale_in_drops_last_member() {
        let fleet = FleetConfig::default();
        for n in (fleet.min_instances + 1)..=fleet.max_instances {
            let current = fleet.canonical_block(n);
            let next = planner().plan(ScalingDecision::ScaleIn, &current).unwrap();
            assert_eq!(next.len() as u32, n - 1);
            assert_eq!(next, current[..current.len() - 1].to_vec());
        }
    }

    #[test]
    fn scale_in_keeps_drifted_order() {
        let current = ips(&["10.2.22.30", "10.2.22.21", "10.2.22.25"]);
        let next = planner().plan(ScalingDecision::ScaleIn, &current).unwrap();
        assert_eq!(next, ips(&["10.2.22.30", "10.2.22.21"]));
    }

    #[test]
    fn no_action_has_no_plan() {
        let current = ips(&["10.2.22.21", "10.2.22.22"]);
        assert_eq!(planner().plan(ScalingDecision::NoAction, &current), None);
    }
}
