//! Cross-datacenter station/channel dedup (§4.5 step 5): when two data
//! centers answer for the same (network, station, start_time), exactly
//! one survives.

use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct ChannelRow<T> {
    pub datacenter_id: i64,
    pub network: String,
    pub station: String,
    pub location: String,
    pub channel: String,
    pub start_time: DateTime<Utc>,
    pub payload: T,
}

/// Drops every row belonging to a data center that lost the tie on
/// `(network, station, start_time)`.
///
/// With a routing validator (`Some`), the surviving data center is the
/// lowest-id DC for which the validator accepts at least one of that DC's
/// channel tuples in the tied group; a group the validator accepts
/// nobody for has no survivor (§9 open question: silence means drop,
/// not keep-everyone). Without a validator (`Explicit`/`Iris` routing,
/// or EIDA routing that returned no mapping), `db_preferred_datacenter`
/// breaks the tie instead; a group with no DB preference among the
/// candidates also has no survivor.
pub fn dedup_across_datacenters<T: Clone>(
    rows: Vec<ChannelRow<T>>,
    validator: Option<&dyn Fn(i64, &str, &str, &str, &str) -> bool>,
    db_preferred_datacenter: &dyn Fn(&str, &str) -> Option<i64>,
) -> Vec<ChannelRow<T>> {
    let mut groups: HashMap<(String, String, DateTime<Utc>), Vec<usize>> = HashMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry((row.network.clone(), row.station.clone(), row.start_time)).or_default().push(i);
    }

    let mut survivors: HashSet<usize> = HashSet::new();

    for ((network, station, _start), idxs) in &groups {
        let dc_ids: BTreeSet<i64> = idxs.iter().map(|&i| rows[i].datacenter_id).collect();
        if dc_ids.len() <= 1 {
            survivors.extend(idxs.iter().copied());
            continue;
        }

        let survivor_dc = match validator {
            Some(validator) => dc_ids.iter().copied().find(|&dc| {
                idxs.iter().any(|&i| {
                    let r = &rows[i];
                    r.datacenter_id == dc && validator(dc, &r.network, &r.station, &r.location, &r.channel)
                })
            }),
            None => db_preferred_datacenter(network, station).filter(|dc| dc_ids.contains(dc)),
        };

        match survivor_dc {
            Some(dc) => {
                for &i in idxs {
                    if rows[i].datacenter_id == dc {
                        survivors.insert(i);
                    } else {
                        log::info!(
                            target: "seisflow_policies::dedup",
                            "duplicated station {network}.{station}: dropping datacenter {} in favor of {dc}",
                            rows[i].datacenter_id,
                        );
                    }
                }
            }
            None => {
                log::info!(
                    target: "seisflow_policies::dedup",
                    "duplicated station {network}.{station}: no datacenter survived the tie, dropping all {} candidates",
                    idxs.len(),
                );
            }
        }
    }

    rows.into_iter().enumerate().filter(|(i, _)| survivors.contains(i)).map(|(_, r)| r).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(dc: i64, station: &str, channel: &str) -> ChannelRow<()> {
        ChannelRow {
            datacenter_id: dc,
            network: "IV".into(),
            station: station.into(),
            location: "".into(),
            channel: channel.into(),
            start_time: Utc::now(),
            payload: (),
        }
    }

    #[test]
    fn single_datacenter_group_is_kept_untouched() {
        let rows = vec![row(1, "A", "HHZ")];
        let out = dedup_across_datacenters(rows, None, &|_, _| None);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn validator_present_keeps_lowest_id_dc_it_accepts() {
        let t = Utc::now();
        let mut a = row(2, "A", "HHZ");
        a.start_time = t;
        let mut b = row(1, "A", "HHZ");
        b.start_time = t;
        let rows = vec![a, b];

        // Validator rejects DC 1, accepts DC 2.
        let validator = |dc: i64, _: &str, _: &str, _: &str, _: &str| dc == 2;
        let out = dedup_across_datacenters(rows, Some(&validator), &|_, _| None);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].datacenter_id, 2);
    }

    #[test]
    fn validator_rejecting_everyone_drops_the_whole_group() {
        let t = Utc::now();
        let mut a = row(1, "A", "HHZ");
        a.start_time = t;
        let mut b = row(2, "A", "HHZ");
        b.start_time = t;
        let rows = vec![a, b];
        let validator = |_: i64, _: &str, _: &str, _: &str, _: &str| false;
        let out = dedup_across_datacenters(rows, Some(&validator), &|_, _| None);
        assert!(out.is_empty());
    }

    #[test]
    fn no_validator_falls_back_to_db_preference() {
        let t = Utc::now();
        let mut a = row(1, "A", "HHZ");
        a.start_time = t;
        let mut b = row(2, "A", "HHZ");
        b.start_time = t;
        let rows = vec![a, b];
        let out = dedup_across_datacenters(rows, None, &|_, _| Some(2));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].datacenter_id, 2);
    }

    #[test]
    fn no_validator_and_no_db_preference_drops_the_group() {
        let t = Utc::now();
        let mut a = row(1, "A", "HHZ");
        a.start_time = t;
        let mut b = row(2, "A", "HHZ");
        b.start_time = t;
        let rows = vec![a, b];
        let out = dedup_across_datacenters(rows, None, &|_, _| None);
        assert!(out.is_empty());
    }
}
