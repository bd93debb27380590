use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use sf_toolkit_client::security::url as url_security;
use sf_toolkit_client::{Connection, RequestBuilder};
use sf_toolkit_records::{decode_json, encode_json_typed, is_single_type, Record, SObjectSchema};

use crate::collections::{
    plan_batches, CollectionRequest, CollectionResult, FetchOptions, FetchResult, RetrieveRequest,
    SalesforceError, SaveOptions, SaveOutcome,
};
use crate::dispatch::{check_chunk_size, Dispatcher, Progress, MAX_COLLECTION_BATCH, MAX_FETCH_BATCH};
use crate::error::{Error, Result};

/// One Collections request and the input positions it carries.
struct Chunk {
    positions: Vec<usize>,
    request: RequestBuilder,
}

fn dispatcher_for(options: &SaveOptions) -> Result<(Dispatcher, usize)> {
    let batch_size = check_chunk_size(options.batch_size, MAX_COLLECTION_BATCH)?;
    Ok((Dispatcher::new(options.concurrency)?, batch_size))
}

fn missing_result() -> SaveOutcome {
    SaveOutcome::Failure {
        errors: vec![SalesforceError::missing_result()],
    }
}

/// Insert `field` into an encoded Collections row.
fn with_field(mut row: Value, field: &str, value: Value) -> Value {
    if let Value::Object(map) = &mut row {
        map.insert(field.to_string(), value);
    }
    row
}

impl<C: Connection> super::SalesforceRestClient<C> {
    /// Create records through sObject Collections.
    ///
    /// Records may mix sObject types. Each successful record receives its
    /// new Id and has its pending changes cleared. Outcomes are reported at
    /// each record's input position.
    pub async fn save_insert(
        &self,
        records: &mut [Record],
        options: &SaveOptions,
    ) -> Result<Vec<SaveOutcome>> {
        self.save_insert_with_progress(records, options, |_| {}).await
    }

    /// [`save_insert`](Self::save_insert), reporting each completed request.
    #[instrument(skip(self, records, options, on_chunk), fields(records = records.len()))]
    pub async fn save_insert_with_progress(
        &self,
        records: &mut [Record],
        options: &SaveOptions,
        on_chunk: impl FnMut(Progress),
    ) -> Result<Vec<SaveOutcome>> {
        let (dispatcher, batch_size) = dispatcher_for(options)?;
        if let Some(index) = records.iter().position(|r| r.id().is_some()) {
            return Err(Error::validation(format!(
                "record at index {index} already has an Id; use save_update"
            )));
        }

        let pending: Vec<usize> = (0..records.len()).collect();
        let url = self.connection.rest_url("composite/sobjects");
        let chunks = self.build_chunks(records, &pending, batch_size, |positions| {
            let body = CollectionRequest {
                all_or_none: options.all_or_none,
                records: positions
                    .iter()
                    .map(|&p| encode_json_typed(&records[p], false))
                    .collect(),
            };
            Ok(RequestBuilder::post(&url).json(&body)?)
        })?;

        let outcomes = self
            .dispatch_chunks(&dispatcher, vec![None; records.len()], chunks, on_chunk)
            .await;
        for (record, outcome) in records.iter_mut().zip(&outcomes) {
            if let SaveOutcome::Success { id: Some(id), .. } = outcome {
                record.assign_id(id.clone());
                record.clear_dirty();
            }
        }
        Ok(outcomes)
    }

    /// Update records through sObject Collections.
    ///
    /// Every record must carry an Id. With `only_changes`, only dirty fields
    /// are sent and records without changes are reported as successful
    /// without being sent.
    pub async fn save_update(
        &self,
        records: &mut [Record],
        options: &SaveOptions,
    ) -> Result<Vec<SaveOutcome>> {
        self.save_update_with_progress(records, options, |_| {}).await
    }

    /// [`save_update`](Self::save_update), reporting each completed request.
    #[instrument(skip(self, records, options, on_chunk), fields(records = records.len()))]
    pub async fn save_update_with_progress(
        &self,
        records: &mut [Record],
        options: &SaveOptions,
        on_chunk: impl FnMut(Progress),
    ) -> Result<Vec<SaveOutcome>> {
        let (dispatcher, batch_size) = dispatcher_for(options)?;
        if let Some(index) = records.iter().position(|r| r.id().is_none()) {
            return Err(Error::validation(format!(
                "record at index {index} has no Id; use save_insert"
            )));
        }

        let (initial, pending) = skip_unchanged(records, options.only_changes);
        let url = self.connection.rest_url("composite/sobjects");
        let chunks = self.build_chunks(records, &pending, batch_size, |positions| {
            let rows = positions
                .iter()
                .map(|&p| {
                    let record = &records[p];
                    let id = record.id().unwrap_or_default().to_string();
                    with_field(
                        encode_json_typed(record, options.only_changes),
                        record.schema().id_field(),
                        Value::String(id),
                    )
                })
                .collect();
            let body = CollectionRequest {
                all_or_none: options.all_or_none,
                records: rows,
            };
            Ok(RequestBuilder::patch(&url).json(&body)?)
        })?;

        let outcomes = self
            .dispatch_chunks(&dispatcher, initial, chunks, on_chunk)
            .await;
        for (record, outcome) in records.iter_mut().zip(&outcomes) {
            if outcome.is_success() {
                record.clear_dirty();
            }
        }
        Ok(outcomes)
    }

    /// Upsert records of one sObject type keyed by an external id field.
    ///
    /// Every record must hold a value for `external_id_field`. Records
    /// created by the upsert receive their new Id.
    pub async fn save_upsert(
        &self,
        records: &mut [Record],
        external_id_field: &str,
        options: &SaveOptions,
    ) -> Result<Vec<SaveOutcome>> {
        self.save_upsert_with_progress(records, external_id_field, options, |_| {})
            .await
    }

    /// [`save_upsert`](Self::save_upsert), reporting each completed request.
    #[instrument(skip(self, records, options, on_chunk), fields(records = records.len()))]
    pub async fn save_upsert_with_progress(
        &self,
        records: &mut [Record],
        external_id_field: &str,
        options: &SaveOptions,
        on_chunk: impl FnMut(Progress),
    ) -> Result<Vec<SaveOutcome>> {
        let (dispatcher, batch_size) = dispatcher_for(options)?;
        let Some(first) = records.first() else {
            return Ok(Vec::new());
        };
        if !is_single_type(records) {
            return Err(Error::validation(
                "upsert requires every record to share one sObject type",
            ));
        }
        let schema = Arc::clone(first.schema());
        if schema.field(external_id_field).is_none() {
            return Err(Error::validation(format!(
                "{} has no field '{external_id_field}'",
                schema.name()
            )));
        }
        if let Some(index) = records
            .iter()
            .position(|r| r.get(external_id_field).is_none_or(|v| v.is_null()))
        {
            return Err(Error::validation(format!(
                "record at index {index} has no value for '{external_id_field}'"
            )));
        }

        let (initial, pending) = skip_unchanged(records, options.only_changes);
        let url = self.connection.rest_url(&format!(
            "composite/sobjects/{}/{external_id_field}",
            schema.name()
        ));
        let chunks = self.build_chunks(records, &pending, batch_size, |positions| {
            let rows = positions
                .iter()
                .map(|&p| {
                    let record = &records[p];
                    let key = record
                        .get(external_id_field)
                        .map(|v| v.to_json())
                        .unwrap_or(Value::Null);
                    with_field(
                        encode_json_typed(record, options.only_changes),
                        external_id_field,
                        key,
                    )
                })
                .collect();
            let body = CollectionRequest {
                all_or_none: options.all_or_none,
                records: rows,
            };
            Ok(RequestBuilder::patch(&url).json(&body)?)
        })?;

        let outcomes = self
            .dispatch_chunks(&dispatcher, initial, chunks, on_chunk)
            .await;
        for (record, outcome) in records.iter_mut().zip(&outcomes) {
            if let SaveOutcome::Success { id, .. } = outcome {
                if let (None, Some(id)) = (record.id(), id) {
                    record.assign_id(id.clone());
                }
                record.clear_dirty();
            }
        }
        Ok(outcomes)
    }

    /// Delete records by Id through sObject Collections.
    ///
    /// With `clear_ids`, successfully deleted records have their Id removed
    /// so they can be inserted again.
    pub async fn delete(
        &self,
        records: &mut [Record],
        clear_ids: bool,
        options: &SaveOptions,
    ) -> Result<Vec<SaveOutcome>> {
        self.delete_with_progress(records, clear_ids, options, |_| {})
            .await
    }

    /// [`delete`](Self::delete), reporting each completed request.
    #[instrument(skip(self, records, options, on_chunk), fields(records = records.len()))]
    pub async fn delete_with_progress(
        &self,
        records: &mut [Record],
        clear_ids: bool,
        options: &SaveOptions,
        on_chunk: impl FnMut(Progress),
    ) -> Result<Vec<SaveOutcome>> {
        let (dispatcher, batch_size) = dispatcher_for(options)?;
        for (index, record) in records.iter().enumerate() {
            match record.id() {
                None => {
                    return Err(Error::validation(format!(
                        "record at index {index} has no Id to delete"
                    )));
                }
                Some(id) if !url_security::is_valid_salesforce_id(id) => {
                    return Err(Error::validation(format!("invalid record Id '{id}'")));
                }
                Some(_) => {}
            }
        }

        let url = self.connection.rest_url("composite/sobjects");
        let positions: Vec<usize> = (0..records.len()).collect();
        let chunks = positions
            .chunks(batch_size)
            .map(|positions| {
                let ids: Vec<&str> = positions
                    .iter()
                    .filter_map(|&p| records[p].id())
                    .collect();
                let request = RequestBuilder::delete(&url)
                    .query("ids", ids.join(","))
                    .query("allOrNone", options.all_or_none.to_string());
                Chunk {
                    positions: positions.to_vec(),
                    request,
                }
            })
            .collect();

        let outcomes = self
            .dispatch_chunks(&dispatcher, vec![None; records.len()], chunks, on_chunk)
            .await;
        if clear_ids {
            for (record, outcome) in records.iter_mut().zip(&outcomes) {
                if outcome.is_success() {
                    record.clear_id();
                }
            }
        }
        Ok(outcomes)
    }

    /// Retrieve records by Id, selecting every field of `schema`.
    ///
    /// Entries line up with `ids`; an Id the server could not find yields
    /// `Ok(None)`. A failed request marks each Id it carried with the
    /// request's error and leaves the other requests' records intact.
    pub async fn fetch_list(
        &self,
        schema: &Arc<SObjectSchema>,
        ids: &[&str],
        options: &FetchOptions,
    ) -> Result<Vec<FetchResult>> {
        self.fetch_list_with_progress(schema, ids, options, |_| {})
            .await
    }

    /// [`fetch_list`](Self::fetch_list), reporting each completed request.
    #[instrument(skip(self, schema, ids, options, on_chunk), fields(sobject = schema.name(), ids = ids.len()))]
    pub async fn fetch_list_with_progress(
        &self,
        schema: &Arc<SObjectSchema>,
        ids: &[&str],
        options: &FetchOptions,
        on_chunk: impl FnMut(Progress),
    ) -> Result<Vec<FetchResult>> {
        let batch_size = check_chunk_size(options.batch_size, MAX_FETCH_BATCH)?;
        let dispatcher = Dispatcher::new(options.concurrency)?;
        if let Some(bad) = ids.iter().find(|id| !url_security::is_valid_salesforce_id(id)) {
            return Err(Error::validation(format!("invalid record Id '{bad}'")));
        }
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.connection.rest_url(&format!("composite/sobjects/{}", schema.name()));
        let fields: Vec<String> = schema.field_names().map(str::to_string).collect();
        let requests = ids
            .chunks(batch_size)
            .map(|chunk| {
                let body = RetrieveRequest {
                    ids: chunk.iter().map(|id| id.to_string()).collect(),
                    fields: fields.clone(),
                };
                Ok(RequestBuilder::post(&url).json(&body)?)
            })
            .collect::<Result<Vec<_>>>()?;
        debug!(requests = requests.len(), "Fetching records by Id");

        let operations = requests
            .into_iter()
            .map(|request| self.send_json::<Vec<Option<Value>>>(request))
            .collect();
        let results = dispatcher.run_with_progress(operations, on_chunk).await;

        let mut records = Vec::with_capacity(ids.len());
        for (chunk, result) in ids.chunks(batch_size).zip(results) {
            match result {
                Ok(rows) => {
                    if rows.len() != chunk.len() {
                        warn!(
                            expected = chunk.len(),
                            received = rows.len(),
                            "Retrieve response length mismatch"
                        );
                    }
                    let mut rows = rows.into_iter();
                    for _ in chunk {
                        records.push(match rows.next() {
                            Some(Some(row)) => decode_json(schema, &row)
                                .map(Some)
                                .map_err(|err| SalesforceError::request_failed(&Error::from(err))),
                            Some(None) => Ok(None),
                            None => Err(SalesforceError::missing_result()),
                        });
                    }
                }
                Err(err) => {
                    warn!(error = %err, ids = chunk.len(), "Retrieve request failed");
                    let failure = SalesforceError::request_failed(&err);
                    records.extend(chunk.iter().map(|_| Err(failure.clone())));
                }
            }
        }
        Ok(records)
    }

    /// Build one request per planned batch of `pending` positions.
    fn build_chunks(
        &self,
        records: &[Record],
        pending: &[usize],
        batch_size: usize,
        mut build: impl FnMut(&[usize]) -> Result<RequestBuilder>,
    ) -> Result<Vec<Chunk>> {
        let sobjects: Vec<&str> = pending.iter().map(|&p| records[p].sobject()).collect();
        plan_batches(&sobjects, batch_size)
            .into_iter()
            .map(|batch| {
                let positions: Vec<usize> = batch.into_iter().map(|i| pending[i]).collect();
                let request = build(&positions)?;
                Ok(Chunk { positions, request })
            })
            .collect()
    }

    /// Send every chunk and scatter the results back to input positions.
    ///
    /// A request that fails outright marks each of its records as failed.
    async fn dispatch_chunks(
        &self,
        dispatcher: &Dispatcher,
        mut outcomes: Vec<Option<SaveOutcome>>,
        chunks: Vec<Chunk>,
        on_chunk: impl FnMut(Progress),
    ) -> Vec<SaveOutcome> {
        debug!(chunks = chunks.len(), "Dispatching collection requests");
        let (positions, requests): (Vec<_>, Vec<_>) = chunks
            .into_iter()
            .map(|chunk| (chunk.positions, chunk.request))
            .unzip();
        let operations = requests
            .into_iter()
            .map(|request| self.send_json::<Vec<CollectionResult>>(request))
            .collect();
        let results = dispatcher.run_with_progress(operations, on_chunk).await;

        for (positions, result) in positions.into_iter().zip(results) {
            match result {
                Ok(entries) => {
                    if entries.len() != positions.len() {
                        warn!(
                            expected = positions.len(),
                            received = entries.len(),
                            "Collection response length mismatch"
                        );
                    }
                    let mut entries = entries.into_iter();
                    for position in positions {
                        outcomes[position] =
                            Some(entries.next().map_or_else(missing_result, SaveOutcome::from));
                    }
                }
                Err(err) => {
                    warn!(error = %err, records = positions.len(), "Collection request failed");
                    let failure = SaveOutcome::request_failed(&err);
                    for position in positions {
                        outcomes[position] = Some(failure.clone());
                    }
                }
            }
        }
        outcomes
            .into_iter()
            .map(|outcome| outcome.unwrap_or_else(missing_result))
            .collect()
    }

    async fn send_json<T: serde::de::DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.connection.send(request).await?;
        Ok(response.json()?)
    }
}

/// Split records into those that need sending and pre-filled outcomes for
/// unchanged records skipped under `only_changes`.
fn skip_unchanged(records: &[Record], only_changes: bool) -> (Vec<Option<SaveOutcome>>, Vec<usize>) {
    let mut outcomes = vec![None; records.len()];
    let mut pending = Vec::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        if only_changes && !record.is_dirty() {
            outcomes[position] = Some(SaveOutcome::Success {
                id: record.id().map(str::to_string),
                created: false,
            });
        } else {
            pending.push(position);
        }
    }
    (outcomes, pending)
}
