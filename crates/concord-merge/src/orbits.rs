//! Orbit board: the newest orbit snapshot per user.

use crate::error::{MergeError, Result};

/// Column header of the merged board.
pub const ORBIT_HEADER: &str =
    "# user,vessel,body,epochUT,sma,ecc,inc_deg,lan_deg,argp_deg,mna_rad,colorHex,updatedUT";

const FIELD_COUNT: usize = 12;
const UPDATED_FIELD: usize = 11;

/// One user's orbit line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitRecord {
    pub user: String,
    /// `updatedUT` column. Unparsable values read as zero.
    pub updated: f64,
    /// The CSV line as posted, trimmed.
    pub line: String,
}

impl OrbitRecord {
    /// Parse the first line of a posted body.
    pub fn parse(text: &str) -> Result<Self> {
        let line = text.trim().lines().next().unwrap_or_default().trim();
        if !line.contains(',') {
            return Err(MergeError::InvalidOrbit("not a CSV line"));
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() < FIELD_COUNT {
            return Err(MergeError::InvalidOrbit("fewer than 12 fields"));
        }

        let user = fields[0].trim();
        if user.is_empty() {
            return Err(MergeError::InvalidOrbit("missing user"));
        }

        let updated = fields[UPDATED_FIELD]
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .unwrap_or(0.0);

        Ok(Self {
            user: user.to_string(),
            updated,
            line: line.to_string(),
        })
    }

    /// Whether this record should replace `prev`. Ties go to the newcomer.
    pub fn supersedes(&self, prev: &OrbitRecord) -> bool {
        self.updated >= prev.updated
    }
}

/// Render the board, newest first.
pub fn render_orbits(mut records: Vec<OrbitRecord>) -> String {
    if records.is_empty() {
        return "# empty\n".to_string();
    }

    records.sort_by(|a, b| {
        b.updated
            .total_cmp(&a.updated)
            .then_with(|| a.user.cmp(&b.user))
    });

    let mut out = String::from(ORBIT_HEADER);
    out.push('\n');
    for record in &records {
        out.push_str(&record.line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(user: &str, updated: &str) -> String {
        format!("{},Probe,Kerbin,100,700000,0.01,0.5,10,20,0.3,#ff8800,{}", user, updated)
    }

    #[test]
    fn parses_twelve_field_line() {
        let record = OrbitRecord::parse(&format!("{}\n", line("alice", "1234.5"))).unwrap();
        assert_eq!(record.user, "alice");
        assert_eq!(record.updated, 1234.5);
        assert!(!record.line.ends_with('\n'));
    }

    #[test]
    fn rejects_short_or_non_csv_lines() {
        assert!(OrbitRecord::parse("hello").is_err());
        assert!(OrbitRecord::parse("a,b,c").is_err());
        assert!(OrbitRecord::parse(&line("", "1")).is_err());
    }

    #[test]
    fn unparsable_updated_reads_as_zero() {
        let record = OrbitRecord::parse(&line("bob", "soon")).unwrap();
        assert_eq!(record.updated, 0.0);
    }

    #[test]
    fn newer_or_equal_supersedes() {
        let old = OrbitRecord::parse(&line("alice", "10")).unwrap();
        let same = OrbitRecord::parse(&line("alice", "10")).unwrap();
        let stale = OrbitRecord::parse(&line("alice", "9")).unwrap();
        assert!(same.supersedes(&old));
        assert!(!stale.supersedes(&old));
    }

    #[test]
    fn board_is_newest_first() {
        let records = vec![
            OrbitRecord::parse(&line("alice", "5")).unwrap(),
            OrbitRecord::parse(&line("bob", "50")).unwrap(),
            OrbitRecord::parse(&line("carol", "20")).unwrap(),
        ];
        let board = render_orbits(records);
        let users: Vec<_> = board
            .lines()
            .skip(1)
            .map(|l| l.split(',').next().unwrap())
            .collect();
        assert!(board.starts_with(ORBIT_HEADER));
        assert_eq!(users, vec!["bob", "carol", "alice"]);
    }

    #[test]
    fn empty_board() {
        assert_eq!(render_orbits(Vec::new()), "# empty\n");
    }
}
