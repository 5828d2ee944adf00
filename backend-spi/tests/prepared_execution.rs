//! FILENAME: backend-spi/tests/prepared_execution.rs
//! Prepared execution contract against an in-test backend.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use backend_spi::*;
use model::*;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct CountingBackend {
    executions: AtomicUsize,
    reuse_candidates: AtomicUsize,
    can_reuse: bool,
    seen: Mutex<Vec<Fingerprint>>,
}

struct StaticResult {
    definition: Arc<ExecutionDefinition>,
    fingerprint: Fingerprint,
    backend: Arc<CountingBackend>,
    cancel: CancellationToken,
}

#[async_trait]
impl ExecutionBackend for CountingBackend {
    fn name(&self) -> &str {
        "counting"
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            can_transform_existing_result: self.can_reuse,
            ..Default::default()
        }
    }

    async fn execute(self: Arc<Self>, request: ExecutionRequest) -> Result<Arc<dyn ExecutionResult>, BackendError> {
        self.executions.fetch_add(1, Ordering::SeqCst);
        if request.origin.is_some() {
            self.reuse_candidates.fetch_add(1, Ordering::SeqCst);
        }
        self.seen.lock().unwrap().push(request.fingerprint.clone());
        Ok(Arc::new(StaticResult {
            fingerprint: request.fingerprint.join("static"),
            definition: request.definition,
            backend: self.clone(),
            cancel: request.cancel,
        }))
    }
}

#[async_trait]
impl ExecutionResult for StaticResult {
    fn definition(&self) -> &Arc<ExecutionDefinition> {
        &self.definition
    }

    fn dimensions(&self) -> &[DimensionDescriptor] {
        &[]
    }

    fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    async fn read_all(&self) -> Result<DataView, BackendError> {
        Err(BackendError::NoData("static".into()))
    }

    async fn read_window(&self, offset: &[usize], size: &[usize]) -> Result<DataView, BackendError> {
        let window = ResultWindow::new(offset, size);
        window.check_arity(self.definition.dimensions().len())?;
        Ok(DataView::for_window(self.definition.clone(), &self.fingerprint, &window, DataViewPayload::default()))
    }

    fn transform(&self) -> PreparedExecution {
        PreparedExecution::transformed(
            self.backend.clone(),
            &self.definition,
            TransformOrigin::new(&self.definition, self.fingerprint.clone()),
            self.cancel.clone(),
        )
    }
}

fn factory(backend: Arc<CountingBackend>) -> ExecutionFactory {
    ExecutionFactory::new("test", backend)
}

fn sales_items() -> Vec<AttributeOrMeasure> {
    vec![
        Attribute::new(ObjRef::identifier("df1")).with_local_id("region").into(),
        Measure::simple(ObjRef::identifier("m1"))
            .aggregation(MeasureAggregation::Sum)
            .local_id("sales")
            .build()
            .into(),
    ]
}

#[tokio::test]
async fn test_invalid_definition_fails_before_io() {
    let backend = Arc::new(CountingBackend::default());
    let prepared = factory(backend.clone()).for_items(sales_items(), vec![]).unwrap();
    let broken = prepared.with_sorting(vec![new_attribute_sort("city", SortDirection::Asc, false)]);

    let err = broken.execute().await.err().unwrap();
    assert!(err.is_validation());
    assert_eq!(backend.executions.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_with_sorting_does_not_mutate_receiver() {
    let backend = Arc::new(CountingBackend::default());
    let original = factory(backend.clone()).for_items(sales_items(), vec![]).unwrap();
    let before = original.fingerprint().clone();

    let sorted = original.with_sorting(vec![new_attribute_sort("region", SortDirection::Desc, false)]);
    let relaid = original
        .with_dimensions(&[
            DimensionSpec::from(new_dimension(["region"], vec![])),
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
        ])
        .unwrap();

    assert_eq!(original.fingerprint(), &before);
    assert_ne!(sorted.fingerprint(), &before);
    assert_ne!(relaid.fingerprint(), &before);
    assert!(original.equals(&original.clone()));
    assert!(!original.equals(&sorted));
}

#[tokio::test]
async fn test_factory_applies_default_dimensions() {
    let backend = Arc::new(CountingBackend::default());
    let prepared = factory(backend.clone()).for_items(sales_items(), vec![]).unwrap();
    let dims = prepared.definition().dimensions();

    assert_eq!(dims.len(), 2);
    assert_eq!(dims[0].item_identifiers, vec![MEASURE_GROUP.to_string()]);
    assert_eq!(dims[1].item_identifiers, vec!["region".to_string()]);

    let result = prepared.execute().await.unwrap();
    assert_eq!(result.definition().fingerprint(), *prepared.fingerprint());
    assert_eq!(backend.seen.lock().unwrap().as_slice(), &[prepared.fingerprint().clone()]);
}

#[tokio::test]
async fn test_bucket_totals_land_in_attribute_dimension() {
    let backend = Arc::new(CountingBackend::default());
    let buckets = vec![
        Bucket::new("measures", vec![sales_items().remove(1)]),
        Bucket::new("attribute", vec![sales_items().remove(0)])
            .with_totals(vec![Total::new(TotalType::Sum, "sales", "region")]),
    ];
    let prepared = factory(backend).for_buckets(&buckets, vec![]).unwrap();
    let dims = prepared.definition().dimensions();

    assert!(dims[0].totals.is_empty());
    assert_eq!(dims[1].totals.len(), 1);
}

#[tokio::test]
async fn test_window_arity_is_validated() {
    let backend = Arc::new(CountingBackend::default());
    let result = factory(backend).for_items(sales_items(), vec![]).unwrap().execute().await.unwrap();

    let err = result.read_window(&[0], &[10]).await.err().unwrap();
    assert!(err.is_validation());

    let v1 = result.read_window(&[0, 0], &[2, 2]).await.unwrap();
    let v2 = result.read_window(&[1, 0], &[2, 2]).await.unwrap();
    assert_ne!(v1.fingerprint(), v2.fingerprint());
}

#[tokio::test]
async fn test_transform_reuse_eligibility() {
    let backend = Arc::new(CountingBackend {
        can_reuse: true,
        ..Default::default()
    });
    let result = factory(backend.clone()).for_items(sales_items(), vec![]).unwrap().execute().await.unwrap();

    let transformed = result.transform();
    assert!(transformed.is_transformed());
    assert!(transformed.definition().sort_by().is_empty());
    assert_eq!(transformed.definition().dimensions().len(), 2);

    transformed
        .with_sorting(vec![new_attribute_sort("region", SortDirection::Desc, false)])
        .execute()
        .await
        .unwrap();
    assert_eq!(backend.reuse_candidates.load(Ordering::SeqCst), 1);

    let with_native = transformed
        .with_dimensions(&[
            DimensionSpec::from(new_dimension([MEASURE_GROUP], vec![])),
            DimensionSpec::from(new_dimension(
                ["region"],
                vec![Total::new(TotalType::Nat, "sales", "region")],
            )),
        ])
        .unwrap();
    with_native.execute().await.unwrap();
    assert_eq!(backend.reuse_candidates.load(Ordering::SeqCst), 1);
    assert_eq!(backend.executions.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_transform_without_capability_is_full_execution() {
    let backend = Arc::new(CountingBackend::default());
    let result = factory(backend.clone()).for_items(sales_items(), vec![]).unwrap().execute().await.unwrap();

    result.transform().execute().await.unwrap();
    assert_eq!(backend.reuse_candidates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_execution() {
    let backend = Arc::new(CountingBackend::default());
    let token = CancellationToken::new();
    let prepared = factory(backend.clone())
        .for_items(sales_items(), vec![])
        .unwrap()
        .with_cancellation(token.clone());

    token.cancel();
    let err = prepared.execute().await.err().unwrap();
    assert!(matches!(err, BackendError::Cancelled));
    assert_eq!(backend.executions.load(Ordering::SeqCst), 0);
}
