use std::path::Path;

use rusqlite::{Connection, OpenFlags, params};

use gk_core::wire::{
    WireCombination, WireFrame, WireGesture, WireModel, WirePart, WirePose, WirePrototype,
    WireSample, WireSystem,
};
use gk_core::{GestureCombinations, GestureError};

use crate::error::{Result, StoreError};
use crate::schema;

/// A gesture database file: one SQLite file holding a whole system
/// (all parts, gestures, samples and the trained model).
#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    /// Open or create a database file.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    /// Open an existing database file; a missing path is an error rather
    /// than an implicit create (load semantics).
    pub fn open_existing(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|_| StoreError::Engine(GestureError::InvalidPath))?;
        // Reject files that are not gesturekit databases.
        if schema::get_schema_version(&conn).unwrap_or(None).is_none() {
            return Err(StoreError::Engine(GestureError::InvalidFile));
        }
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Save ---

    pub fn save_system(&self, system: &GestureCombinations) -> Result<()> {
        self.save_wire_with(&WireSystem::from_system(system), |_, _| true)
            .map(|_| ())
    }

    /// Save a wire system, reporting progress after each part. The callback
    /// returns whether to continue; on `false` the transaction is rolled
    /// back and `Ok(false)` is returned.
    pub fn save_wire_with(
        &self,
        wire: &WireSystem,
        mut on_part: impl FnMut(usize, usize) -> bool,
    ) -> Result<bool> {
        let tx = self.conn.unchecked_transaction()?;

        tx.execute_batch(
            "DELETE FROM combination_slots; DELETE FROM combinations;
             DELETE FROM prototypes; DELETE FROM models;
             DELETE FROM frames; DELETE FROM samples;
             DELETE FROM gestures; DELETE FROM parts;",
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('next_combination_id', ?1)",
            [wire.next_combination_id.to_string()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES ('wire_version', ?1)",
            [wire.version.as_str()],
        )?;

        let total = wire.parts.len();
        for (idx, part) in wire.parts.iter().enumerate() {
            save_part_on(&tx, idx, part)?;
            if !on_part(idx + 1, total) {
                return Ok(false);
            }
        }

        for combination in &wire.combinations {
            tx.execute(
                "INSERT INTO combinations (id, name, metadata) VALUES (?1, ?2, ?3)",
                params![combination.id, combination.name, combination.metadata],
            )?;
            for (part_idx, gesture_id) in combination.required.iter().enumerate() {
                tx.execute(
                    "INSERT INTO combination_slots (combination_id, part_idx, gesture_id)
                     VALUES (?1, ?2, ?3)",
                    params![combination.id, part_idx, gesture_id],
                )?;
            }
        }

        tx.commit()?;
        Ok(true)
    }

    // --- Load ---

    pub fn load_system(&self) -> Result<GestureCombinations> {
        let wire = self.load_wire()?;
        wire.into_system().map_err(StoreError::Engine)
    }

    pub fn load_wire(&self) -> Result<WireSystem> {
        let version = self
            .get_metadata("wire_version")?
            .unwrap_or_else(|| gk_core::wire::CURRENT_VERSION.to_string());
        let next_combination_id = self
            .get_metadata("next_combination_id")?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);

        let mut parts_stmt = self.conn.prepare(
            "SELECT idx, enabled, frame, contd_period_ms, contd_smoothing, next_gesture_id
             FROM parts ORDER BY idx",
        )?;
        let part_rows: Vec<(usize, bool, String, u32, usize, u32)> = parts_stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)? as usize,
                    row.get::<_, i64>(1)? != 0,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                    row.get::<_, i64>(4)? as usize,
                    row.get::<_, u32>(5)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut parts = Vec::with_capacity(part_rows.len());
        for (idx, enabled, frame_json, contd_period_ms, contd_smoothing, next_gesture_id) in
            part_rows
        {
            let frame = serde_json::from_str(&frame_json).map_err(|e| {
                StoreError::InvalidData(format!("part {idx} frame config: {e}"))
            })?;
            parts.push(WirePart {
                enabled,
                frame,
                contd_period_ms,
                contd_smoothing,
                next_gesture_id,
                gestures: self.load_gestures(idx)?,
                model: self.load_model(idx)?,
            });
        }

        let mut comb_stmt = self
            .conn
            .prepare("SELECT id, name, metadata FROM combinations ORDER BY id")?;
        let comb_rows: Vec<(u32, String, String)> = comb_stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut combinations = Vec::with_capacity(comb_rows.len());
        for (id, name, metadata) in comb_rows {
            let mut slot_stmt = self.conn.prepare(
                "SELECT part_idx, gesture_id FROM combination_slots
                 WHERE combination_id = ?1 ORDER BY part_idx",
            )?;
            let slots: Vec<(usize, Option<u32>)> = slot_stmt
                .query_map([id], |row| {
                    Ok((row.get::<_, i64>(0)? as usize, row.get(1)?))
                })?
                .collect::<std::result::Result<_, _>>()?;

            let mut required = vec![None; parts.len()];
            for (part_idx, gesture_id) in slots {
                if part_idx < required.len() {
                    required[part_idx] = gesture_id;
                }
            }
            combinations.push(WireCombination {
                id,
                name,
                metadata,
                required,
            });
        }

        Ok(WireSystem {
            version,
            parts,
            combinations,
            next_combination_id,
        })
    }

    fn load_gestures(&self, part_idx: usize) -> Result<Vec<WireGesture>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, enabled, metadata FROM gestures
             WHERE part_idx = ?1 ORDER BY rowid",
        )?;
        let rows: Vec<(u32, String, bool, String)> = stmt
            .query_map([part_idx as i64], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get::<_, i64>(2)? != 0,
                    row.get(3)?,
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut gestures = Vec::with_capacity(rows.len());
        for (id, name, enabled, metadata) in rows {
            gestures.push(WireGesture {
                id,
                name,
                enabled,
                metadata,
                samples: self.load_samples(part_idx, id)?,
            });
        }
        Ok(gestures)
    }

    fn load_samples(&self, part_idx: usize, gesture_id: u32) -> Result<Vec<WireSample>> {
        let mut stmt = self.conn.prepare(
            "SELECT sample_idx, hmd_px, hmd_py, hmd_pz, hmd_qw, hmd_qx, hmd_qy, hmd_qz
             FROM samples WHERE part_idx = ?1 AND gesture_id = ?2 ORDER BY sample_idx",
        )?;
        let rows: Vec<(i64, [f64; 3], [f64; 4])> = stmt
            .query_map(params![part_idx as i64, gesture_id], |row| {
                Ok((
                    row.get(0)?,
                    [row.get(1)?, row.get(2)?, row.get(3)?],
                    [row.get(4)?, row.get(5)?, row.get(6)?, row.get(7)?],
                ))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut samples = Vec::with_capacity(rows.len());
        for (sample_idx, p, q) in rows {
            samples.push(WireSample {
                hmd: WirePose { p, q },
                frames: self.load_frames(part_idx, gesture_id, sample_idx, false)?,
                processed: self.load_frames(part_idx, gesture_id, sample_idx, true)?,
            });
        }
        Ok(samples)
    }

    fn load_frames(
        &self,
        part_idx: usize,
        gesture_id: u32,
        sample_idx: i64,
        processed: bool,
    ) -> Result<Vec<WireFrame>> {
        let mut stmt = self.conn.prepare(
            "SELECT px, py, pz, qw, qx, qy, qz, hpx, hpy, hpz, hqw, hqx, hqy, hqz, t
             FROM frames
             WHERE part_idx = ?1 AND gesture_id = ?2 AND sample_idx = ?3 AND processed = ?4
             ORDER BY frame_idx",
        )?;
        let frames = stmt
            .query_map(
                params![part_idx as i64, gesture_id, sample_idx, processed as i64],
                |row| {
                    Ok(WireFrame {
                        p: [row.get(0)?, row.get(1)?, row.get(2)?],
                        q: [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
                        hmd_p: [row.get(7)?, row.get(8)?, row.get(9)?],
                        hmd_q: [row.get(10)?, row.get(11)?, row.get(12)?, row.get(13)?],
                        t: row.get(14)?,
                    })
                },
            )?
            .collect::<std::result::Result<_, _>>()?;
        Ok(frames)
    }

    fn load_model(&self, part_idx: usize) -> Result<Option<WireModel>> {
        let mut stmt = self.conn.prepare(
            "SELECT resolution, temperature, score, stale FROM models WHERE part_idx = ?1",
        )?;
        let row: Option<(i64, f64, f64, bool)> = stmt
            .query_row([part_idx as i64], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get::<_, i64>(3)? != 0,
                ))
            })
            .ok();
        let Some((resolution, temperature, score, stale)) = row else {
            return Ok(None);
        };

        let mut proto_stmt = self.conn.prepare(
            "SELECT gesture_id, sigma, mean FROM prototypes
             WHERE part_idx = ?1 ORDER BY gesture_id",
        )?;
        let proto_rows: Vec<(u32, f64, String)> = proto_stmt
            .query_map([part_idx as i64], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<std::result::Result<_, _>>()?;

        let mut prototypes = Vec::with_capacity(proto_rows.len());
        for (gesture_id, sigma, mean_json) in proto_rows {
            let mean: Vec<f64> = serde_json::from_str(&mean_json).map_err(|e| {
                StoreError::InvalidData(format!("prototype {gesture_id} mean: {e}"))
            })?;
            prototypes.push(WirePrototype {
                gesture_id,
                mean,
                sigma,
            });
        }

        Ok(Some(WireModel {
            resolution: resolution as usize,
            temperature,
            score,
            stale,
            prototypes,
        }))
    }
}

// Row writers, shared by the full and single-part save paths.

fn save_part_on(conn: &Connection, idx: usize, part: &WirePart) -> Result<()> {
    let frame_json = serde_json::to_string(&part.frame)
        .map_err(|e| StoreError::InvalidData(format!("frame config: {e}")))?;
    conn.execute(
        "INSERT INTO parts (idx, enabled, frame, contd_period_ms, contd_smoothing, next_gesture_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            idx as i64,
            part.enabled as i64,
            frame_json,
            part.contd_period_ms,
            part.contd_smoothing as i64,
            part.next_gesture_id,
        ],
    )?;

    for gesture in &part.gestures {
        conn.execute(
            "INSERT INTO gestures (part_idx, id, name, enabled, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                idx as i64,
                gesture.id,
                gesture.name,
                gesture.enabled as i64,
                gesture.metadata,
            ],
        )?;
        for (sample_idx, sample) in gesture.samples.iter().enumerate() {
            conn.execute(
                "INSERT INTO samples (part_idx, gesture_id, sample_idx,
                    hmd_px, hmd_py, hmd_pz, hmd_qw, hmd_qx, hmd_qy, hmd_qz)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    idx as i64,
                    gesture.id,
                    sample_idx as i64,
                    sample.hmd.p[0],
                    sample.hmd.p[1],
                    sample.hmd.p[2],
                    sample.hmd.q[0],
                    sample.hmd.q[1],
                    sample.hmd.q[2],
                    sample.hmd.q[3],
                ],
            )?;
            save_frames_on(conn, idx, gesture.id, sample_idx, false, &sample.frames)?;
            save_frames_on(conn, idx, gesture.id, sample_idx, true, &sample.processed)?;
        }
    }

    if let Some(model) = &part.model {
        conn.execute(
            "INSERT INTO models (part_idx, resolution, temperature, score, stale)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                idx as i64,
                model.resolution as i64,
                model.temperature,
                model.score,
                model.stale as i64,
            ],
        )?;
        for proto in &model.prototypes {
            let mean_json = serde_json::to_string(&proto.mean)
                .map_err(|e| StoreError::InvalidData(format!("prototype mean: {e}")))?;
            conn.execute(
                "INSERT INTO prototypes (part_idx, gesture_id, sigma, mean)
                 VALUES (?1, ?2, ?3, ?4)",
                params![idx as i64, proto.gesture_id, proto.sigma, mean_json],
            )?;
        }
    }
    Ok(())
}

fn save_frames_on(
    conn: &Connection,
    part_idx: usize,
    gesture_id: u32,
    sample_idx: usize,
    processed: bool,
    frames: &[WireFrame],
) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO frames (part_idx, gesture_id, sample_idx, processed, frame_idx,
            px, py, pz, qw, qx, qy, qz, hpx, hpy, hpz, hqw, hqx, hqy, hqz, t)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10,
                 ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18, ?19, ?20)",
    )?;
    for (frame_idx, frame) in frames.iter().enumerate() {
        stmt.execute(params![
            part_idx as i64,
            gesture_id,
            sample_idx as i64,
            processed as i64,
            frame_idx as i64,
            frame.p[0],
            frame.p[1],
            frame.p[2],
            frame.q[0],
            frame.q[1],
            frame.q[2],
            frame.q[3],
            frame.hmd_p[0],
            frame.hmd_p[1],
            frame.hmd_p[2],
            frame.hmd_q[0],
            frame.hmd_q[1],
            frame.hmd_q[2],
            frame.hmd_q[3],
            frame.t,
        ])?;
    }
    Ok(())
}

/// Merge the gestures of another database file into `system` by name.
pub fn import_system(system: &mut GestureCombinations, path: &Path) -> Result<()> {
    let other = Store::open_existing(path)?;
    let wire = other.load_wire()?;
    gk_core::wire::merge_wire(system, wire).map_err(StoreError::Engine)
}

/// Save a single part of a combination system as its own one-part database.
pub fn save_part(system: &GestureCombinations, part: usize, path: &Path) -> Result<()> {
    let part_ref = system.part(part).map_err(StoreError::Engine)?;
    let wire = WireSystem {
        version: gk_core::wire::CURRENT_VERSION.to_string(),
        parts: vec![gk_core::wire::part_to_wire(part_ref)],
        combinations: Vec::new(),
        next_combination_id: 0,
    };
    let store = Store::open(path)?;
    store.save_wire_with(&wire, |_, _| true).map(|_| ())
}

/// Load a one-part database file into the given part of `system`,
/// replacing only that part's gestures and model.
pub fn load_part(system: &mut GestureCombinations, part: usize, path: &Path) -> Result<()> {
    let store = Store::open_existing(path)?;
    let mut wire = store.load_wire()?;
    if wire.parts.len() != 1 {
        return Err(StoreError::Engine(GestureError::InvalidParameter));
    }
    let wire_part = wire.parts.remove(0);
    gk_core::wire::import_part(system, part, wire_part).map_err(StoreError::Engine)
}
