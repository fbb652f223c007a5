use crate::{
    foundation::{
        core::{JobId, SessionId},
        error::{CaptureError, CaptureResult},
    },
    host::DurableStore,
};

const KEY_JOB_ID: &str = "job_id";
const KEY_TEMP_ASSET: &str = "temp_asset_path";
const KEY_EXPOSED_NAME: &str = "exposed_name";
const KEY_DURATION: &str = "duration";

/// State carried through a mode switch in the durable store.
///
/// Written once right before entering Runtime Mode, read and deleted right after the switch
/// completes. Keys are scoped by session id: `{prefix}/{session}/{field}`.
#[derive(Clone, Debug, PartialEq)]
pub struct CrossBoundaryRecord {
    pub session_id: SessionId,
    pub job_id: JobId,
    pub temp_asset_path: String,
    pub exposed_name: String,
    /// Capture length in seconds.
    pub duration: f64,
}

impl CrossBoundaryRecord {
    pub fn write<D: DurableStore + ?Sized>(&self, store: &mut D, prefix: &str) {
        let duration = self.duration.to_string();
        for (field, value) in [
            (KEY_JOB_ID, self.job_id.as_str()),
            (KEY_TEMP_ASSET, self.temp_asset_path.as_str()),
            (KEY_EXPOSED_NAME, self.exposed_name.as_str()),
            (KEY_DURATION, duration.as_str()),
        ] {
            store.set(&key(prefix, self.session_id, field), value);
        }
    }

    /// Read and delete the record for `session`. `Ok(None)` when nothing was written.
    pub fn take<D: DurableStore + ?Sized>(
        store: &mut D,
        prefix: &str,
        session: SessionId,
    ) -> CaptureResult<Option<Self>> {
        let fields = [KEY_JOB_ID, KEY_TEMP_ASSET, KEY_EXPOSED_NAME, KEY_DURATION]
            .map(|field| store.get(&key(prefix, session, field)));
        Self::discard(store, prefix, session);

        if fields.iter().all(Option::is_none) {
            return Ok(None);
        }
        let [job_id, temp_asset_path, exposed_name, duration] = fields;
        let missing = |field: &str| {
            CaptureError::serde(format!(
                "cross-boundary record for session {session} is missing '{field}'"
            ))
        };

        let duration = duration.ok_or_else(|| missing(KEY_DURATION))?;
        let duration: f64 = duration.parse().map_err(|_| {
            CaptureError::serde(format!(
                "cross-boundary duration '{duration}' is not a number"
            ))
        })?;

        Ok(Some(Self {
            session_id: session,
            job_id: JobId(job_id.ok_or_else(|| missing(KEY_JOB_ID))?),
            temp_asset_path: temp_asset_path.ok_or_else(|| missing(KEY_TEMP_ASSET))?,
            exposed_name: exposed_name.ok_or_else(|| missing(KEY_EXPOSED_NAME))?,
            duration,
        }))
    }

    /// Delete every key of `session`'s record, present or not.
    pub fn discard<D: DurableStore + ?Sized>(store: &mut D, prefix: &str, session: SessionId) {
        for field in [KEY_JOB_ID, KEY_TEMP_ASSET, KEY_EXPOSED_NAME, KEY_DURATION] {
            store.delete(&key(prefix, session, field));
        }
    }
}

fn key(prefix: &str, session: SessionId, field: &str) -> String {
    format!("{prefix}/{session}/{field}")
}
