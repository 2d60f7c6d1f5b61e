//! Shell state: the cached snapshot, the outbox, and the active capture draft.

use anyhow::Context;
use siap_core::workflow::{LocationTicket, LocationUpdate, deliver_location};
use siap_core::{
    Coordinate, LocationFailure, SchoolDirectory, SchoolVisit, SubmissionSink,
    VisitCaptureWorkflow, WorkflowConfig,
};
use siap_store::{CacheStore, CachedState};
use siap_sync::DataServiceClient;
use tracing::{info, warn};

pub struct FlushStats {
    pub delivered: usize,
    pub remaining: usize,
}

pub struct Submitted {
    pub visit: SchoolVisit,
    pub stats: FlushStats,
    /// Whether the visit reached the on-disk outbox.
    pub durable: bool,
}

pub struct App<C: CacheStore> {
    cache: C,
    state: CachedState,
    inspector_id: String,
    config: WorkflowConfig,
    active: Option<VisitCaptureWorkflow>,
}

impl<C: CacheStore> App<C> {
    /// Load the cached snapshot. An unreadable cache is reported and replaced
    /// by an empty one rather than blocking the field client.
    ///
    /// Without an explicit inspector id the cached profile's id is used.
    pub fn open(cache: C, inspector_id: Option<String>, config: WorkflowConfig) -> Self {
        let state = match cache.load() {
            Ok(state) => state,
            Err(e) => {
                warn!(error = %e, "cache unreadable; starting empty");
                CachedState::default()
            }
        };
        let inspector_id = inspector_id
            .or_else(|| state.user.as_ref().map(|u| u.id_pengawas.clone()))
            .unwrap_or_default();
        Self {
            cache,
            state,
            inspector_id,
            config,
            active: None,
        }
    }

    pub fn state(&self) -> &CachedState {
        &self.state
    }

    pub fn inspector_id(&self) -> &str {
        &self.inspector_id
    }

    pub fn directory(&self) -> SchoolDirectory {
        SchoolDirectory::new(self.state.schools.clone())
    }

    /// Start a new capture draft, discarding any draft already open.
    pub fn start_visit(&mut self) -> anyhow::Result<&mut VisitCaptureWorkflow> {
        if let Some(previous) = self.active.take() {
            previous.cancel();
        }
        let workflow = VisitCaptureWorkflow::new(self.inspector_id.clone(), self.config)?;
        Ok(self.active.insert(workflow))
    }

    pub fn active_visit(&mut self) -> Option<&mut VisitCaptureWorkflow> {
        self.active.as_mut()
    }

    pub fn cancel_visit(&mut self) {
        if let Some(workflow) = self.active.take() {
            workflow.cancel();
        }
    }

    /// Route a location result to the current draft, if it is still the one
    /// that asked.
    pub fn deliver_location(
        &mut self,
        ticket: &LocationTicket,
        result: Result<Coordinate, LocationFailure>,
    ) -> LocationUpdate {
        deliver_location(self.active.as_mut(), ticket, result)
    }

    /// Submit the active draft: finalize it, queue it durably, then try to
    /// deliver the whole outbox.
    ///
    /// If the outbox cannot be written the visit is still kept in memory and
    /// delivered directly; `durable` reports which path was taken.
    pub async fn submit_visit<S: SubmissionSink>(
        &mut self,
        sink: &S,
    ) -> anyhow::Result<Submitted> {
        let workflow = self.active.as_mut().context("no visit is being captured")?;
        let visit = workflow.submit()?;
        self.active = None;
        self.state.record_finalized(visit.clone());

        if let Err(e) = self.cache.save(&self.state) {
            warn!(visit_id = %visit.id, error = %e, "could not queue visit locally; delivering directly");
            let delivered = match sink.submit(&visit).await {
                Ok(ack) => {
                    self.state.acknowledge(&ack.visit_id)?;
                    eprintln!("  Delivered {}", visit.id);
                    1
                }
                Err(e) => {
                    warn!(visit_id = %visit.id, error = %e, "delivery failed; visit held in memory only");
                    eprintln!("  Could not deliver {}: {e}", visit.id);
                    0
                }
            };
            let stats = FlushStats {
                delivered,
                remaining: self.state.pending().len(),
            };
            return Ok(Submitted {
                visit,
                stats,
                durable: false,
            });
        }
        info!(visit_id = %visit.id, "visit queued for delivery");

        let stats = self.flush(sink).await?;
        Ok(Submitted {
            visit,
            stats,
            durable: true,
        })
    }

    /// Deliver queued visits oldest first. Stops at the first failure so
    /// the remaining visits keep their order.
    pub async fn flush<S: SubmissionSink>(&mut self, sink: &S) -> anyhow::Result<FlushStats> {
        let mut delivered = 0;
        while let Some(visit) = self.state.pending().first().cloned() {
            match sink.submit(&visit).await {
                Ok(ack) => {
                    self.state.acknowledge(&ack.visit_id)?;
                    self.cache.save(&self.state).context("updating outbox")?;
                    delivered += 1;
                    eprintln!("  Delivered {}", visit.id);
                }
                Err(e) => {
                    warn!(visit_id = %visit.id, error = %e, "delivery failed; visit stays queued");
                    eprintln!("  Could not deliver {}: {e}", visit.id);
                    break;
                }
            }
        }
        let remaining = self.state.pending().len();
        info!(delivered, remaining, "outbox flush finished");
        Ok(FlushStats {
            delivered,
            remaining,
        })
    }

    /// Refresh profile, schools, and visit history from the data service.
    pub async fn pull(&mut self, client: &DataServiceClient) -> anyhow::Result<()> {
        let id = self.inspector_id.clone();
        match client.get_user(&id).await {
            Ok(user) => self.state.user = Some(user),
            Err(e) => warn!(error = %e, "profile refresh failed; keeping cached profile"),
        }
        let visits = client.get_visits(&id).await.context("fetching visit history")?;
        let schools = client.get_schools(&id).await.context("fetching schools")?;
        self.state.merge_remote_visits(visits);
        self.state.schools = schools;
        self.cache.save(&self.state).context("saving refreshed cache")?;
        Ok(())
    }

    /// Forget everything cached for this device. Queued visits are kept
    /// unless `discard_outbox` is set.
    pub fn logout(&mut self, discard_outbox: bool) -> anyhow::Result<usize> {
        self.cancel_visit();
        let outbox = std::mem::take(&mut self.state.outbox);
        let dropped = if discard_outbox { outbox.len() } else { 0 };
        self.cache.clear().context("clearing cache")?;
        self.state = CachedState::default();
        if !discard_outbox && !outbox.is_empty() {
            self.state.outbox = outbox;
            self.cache.save(&self.state).context("preserving outbox")?;
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use siap_core::signature::ClientPoint;
    use siap_core::workflow::{EntryList, SchoolSelection, SignatureRole};
    use siap_core::{ImageArtifact, PointerEvent, School, SubmissionAck, SupervisionType};
    use siap_store::{MemoryCache, StoreError};

    use super::*;

    #[derive(Debug)]
    struct Offline;

    impl std::fmt::Display for Offline {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("network unreachable")
        }
    }

    impl std::error::Error for Offline {}

    #[derive(Default)]
    struct RecordingSink {
        offline: bool,
        delivered: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SubmissionSink for RecordingSink {
        type Error = Offline;

        async fn submit(&self, visit: &SchoolVisit) -> Result<SubmissionAck, Offline> {
            if self.offline {
                return Err(Offline);
            }
            self.delivered.lock().unwrap().push(visit.id.clone());
            Ok(SubmissionAck {
                visit_id: visit.id.clone(),
                message: None,
            })
        }
    }

    fn school() -> School {
        School {
            id: "S1".into(),
            npsn: "20100001".into(),
            name: "SDN 1 Menteng".into(),
            principal: "Ibu Sari".into(),
            inspector_id: "P01".into(),
            latitude: Some(-6.2),
            longitude: Some(106.816666),
        }
    }

    /// Loads fine, refuses every write.
    struct ReadOnlyCache;

    impl CacheStore for ReadOnlyCache {
        fn load(&self) -> Result<CachedState, StoreError> {
            Ok(CachedState {
                schools: vec![school()],
                ..CachedState::default()
            })
        }

        fn save(&self, _state: &CachedState) -> Result<(), StoreError> {
            Err(StoreError::Other("disk full".into()))
        }

        fn clear(&self) -> Result<(), StoreError> {
            Ok(())
        }
    }

    fn app() -> App<MemoryCache> {
        let cache = MemoryCache::new(CachedState {
            schools: vec![school()],
            ..CachedState::default()
        });
        App::open(cache, Some("P01".into()), WorkflowConfig::default())
    }

    fn sign(wf: &mut VisitCaptureWorkflow, role: SignatureRole) {
        wf.sign(role, PointerEvent::Begin(ClientPoint::new(10.0, 10.0))).unwrap();
        wf.sign(role, PointerEvent::Move(ClientPoint::new(90.0, 40.0))).unwrap();
        wf.sign(role, PointerEvent::End).unwrap();
    }

    /// Open a draft and fill every stage.
    fn capture<C: CacheStore>(app: &mut App<C>) {
        let school = app.directory().get("S1").cloned().unwrap();
        let wf = app.start_visit().unwrap();
        let SchoolSelection::FetchLocation(ticket) = wf.select_school(school).unwrap() else {
            panic!("expected a location request");
        };
        let here = Coordinate::new(-6.2005, 106.816666).unwrap();
        assert!(matches!(
            app.deliver_location(&ticket, Ok(here)),
            LocationUpdate::Captured { .. }
        ));

        let wf = app.active_visit().unwrap();
        wf.advance().unwrap();
        wf.select_category(SupervisionType::Manajerial).unwrap();
        wf.set_notes("Tata kelola BOS dibahas").unwrap();
        wf.advance().unwrap();
        wf.add_entry(EntryList::Actions, "Rapat komite").unwrap();
        wf.advance().unwrap();
        wf.capture_photo(ImageArtifact::embed("image/jpeg", &[0xff, 0xd8, 0xff]))
            .unwrap();
        sign(wf, SignatureRole::Supervisor);
        sign(wf, SignatureRole::Principal);
    }

    #[tokio::test]
    async fn submitted_visit_is_delivered_and_listed() {
        let mut app = app();
        capture(&mut app);
        let sink = RecordingSink::default();

        let Submitted { visit, stats, .. } = app.submit_visit(&sink).await.unwrap();
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.remaining, 0);
        assert_eq!(app.state().visits[0].id, visit.id);
        assert_eq!(visit.location_status, "DI LOKASI");
        assert!(app.active_visit().is_none());
        assert_eq!(*sink.delivered.lock().unwrap(), [visit.id.clone()]);
    }

    #[tokio::test]
    async fn failed_delivery_keeps_visit_queued() {
        let mut app = app();
        capture(&mut app);

        let Submitted { visit, stats, .. } = app
            .submit_visit(&RecordingSink {
                offline: true,
                ..RecordingSink::default()
            })
            .await
            .unwrap();
        assert_eq!(stats.delivered, 0);
        assert_eq!(app.state().pending()[0].id, visit.id);
        assert_eq!(app.cache.load().unwrap().outbox.len(), 1, "outbox is durable");

        let stats = app.flush(&RecordingSink::default()).await.unwrap();
        assert_eq!(stats.delivered, 1);
        assert!(app.state().pending().is_empty());
    }

    #[tokio::test]
    async fn incomplete_draft_is_not_submitted() {
        let mut app = app();
        app.start_visit().unwrap();
        assert!(app.submit_visit(&RecordingSink::default()).await.is_err());
        assert!(app.active_visit().is_some(), "draft retained");
        assert!(app.state().outbox.is_empty());
    }

    #[test]
    fn location_for_replaced_draft_is_dropped() {
        let mut app = app();
        let ticket = app.start_visit().unwrap().request_location().unwrap();
        app.start_visit().unwrap();
        let here = Coordinate::new(-6.2, 106.8).unwrap();
        assert_eq!(app.deliver_location(&ticket, Ok(here)), LocationUpdate::Stale);

        app.cancel_visit();
        assert_eq!(app.deliver_location(&ticket, Ok(here)), LocationUpdate::Stale);
    }

    #[tokio::test]
    async fn logout_keeps_undelivered_visits_by_default() {
        let mut app = app();
        capture(&mut app);
        let offline = RecordingSink {
            offline: true,
            ..RecordingSink::default()
        };
        app.submit_visit(&offline).await.unwrap();

        assert_eq!(app.logout(false).unwrap(), 0);
        assert!(app.state().schools.is_empty());
        assert_eq!(app.state().outbox.len(), 1);

        assert_eq!(app.logout(true).unwrap(), 1);
        assert!(app.cache.load().unwrap().outbox.is_empty());
    }

    #[tokio::test]
    async fn unwritable_cache_still_delivers_visit() {
        let mut app = App::open(ReadOnlyCache, Some("P01".into()), WorkflowConfig::default());
        capture(&mut app);
        let sink = RecordingSink::default();

        let submitted = app.submit_visit(&sink).await.unwrap();
        assert!(!submitted.durable);
        assert_eq!(submitted.stats.delivered, 1);
        assert_eq!(*sink.delivered.lock().unwrap(), [submitted.visit.id.clone()]);
        assert_eq!(app.state().visits[0].id, submitted.visit.id);
    }

    #[tokio::test]
    async fn unwritable_cache_and_offline_keeps_visit_in_memory() {
        let mut app = App::open(ReadOnlyCache, Some("P01".into()), WorkflowConfig::default());
        capture(&mut app);
        let offline = RecordingSink {
            offline: true,
            ..RecordingSink::default()
        };

        let submitted = app.submit_visit(&offline).await.unwrap();
        assert!(!submitted.durable);
        assert_eq!(submitted.stats.remaining, 1);
        assert_eq!(app.state().pending()[0].id, submitted.visit.id);
    }
}
