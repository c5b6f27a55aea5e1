//! Shared test fixtures.
//!
//! Dump builders used by the integration tests; kept in the library so
//! every test target sees the same legacy shapes.

use std::path::{Path, PathBuf};

/// A minimal but complete legacy export: one row per entity, all
/// cross-references resolvable.
pub const SCENARIO_DUMP: &str = r#"-- legacy EMS export
INSERT INTO `sites`(`id`, `code`, `name`) VALUES (1,'SITE-01','Plant One');
INSERT INTO `users`(`id`, `name`, `email`, `admin`) VALUES (1,'bob',NULL,'1');
INSERT INTO `rtus`(`id`, `serial`, `mac`, `ip`, `site`) VALUES (1,'GW-1','AA:BB','1.2.3.4','SITE-01');
INSERT INTO `meters`(`id`, `name`, `rtu`, `site`, `model`, `multiplier`) VALUES (10,'M-1','GW-1','SITE-01','ION7330',1.0);
INSERT INTO `readings`(`id`, `meter_id`, `log_time`, `v1`, `v2`, `v3`, `i1`, `i2`, `i3`, `kw`, `kvar`, `kva`, `pf`, `kwh_del`, `kwh_rec`, `kw_max`, `kw_max_time`) VALUES (1,10,'2014-06-01 12:00:00',230.1,229.8,230.4,12.5,12.1,12.9,8.6,1.2,8.7,0.98,10250.0,3.0,9.1,'2014-05-30 18:15:00');
"#;

/// The scenario dump with the meter pointing at a gateway serial that
/// does not exist anywhere in the dump.
pub const ORPHAN_METER_DUMP: &str = r#"INSERT INTO `sites`(`id`, `code`, `name`) VALUES (1,'SITE-01','Plant One');
INSERT INTO `users`(`id`, `name`, `email`, `admin`) VALUES (1,'bob',NULL,'1');
INSERT INTO `rtus`(`id`, `serial`, `mac`, `ip`, `site`) VALUES (1,'GW-1','AA:BB','1.2.3.4','SITE-01');
INSERT INTO `meters`(`id`, `name`, `rtu`, `site`) VALUES (10,'M-1','GW-MISSING','SITE-01');
INSERT INTO `readings`(`id`, `meter_id`, `log_time`, `kw`) VALUES (1,10,'2014-06-01 12:00:00',8.6);
"#;

/// Write dump contents into `dir` and return the file path.
pub fn write_dump(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("legacy.sql");
    std::fs::write(&path, contents).expect("failed to write dump fixture");
    path
}
