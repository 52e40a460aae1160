use std::sync::Arc;

use ballast_cache::{Allotment, TrackedAllotment};

#[test]
fn owner_observes_capacity_pushed_through_trait_object() {
    let tracked = TrackedAllotment::new(0).unwrap();
    let allotment: Arc<dyn Allotment> = Arc::new(tracked.clone());

    tracked.set_size(700);
    allotment.set_capacity(512).unwrap();

    assert_eq!(tracked.capacity(), 512);
    assert_eq!(tracked.overflow(), 188);
    assert_eq!(allotment.size(), 700);

    tracked.add_size(-200);
    assert_eq!(tracked.overflow(), 0);
}
