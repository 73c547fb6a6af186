use std::thread::sleep;

use crate::utils::time::timestamp_millis;

#[test]
fn test_timestamp_millis() {
    let t1 = timestamp_millis();
    sleep(std::time::Duration::from_millis(10));
    let t2 = timestamp_millis();

    // Ensure time is moving forward
    assert!(t2 > t1);
    assert!(t1 > 1_609_459_200_000); // Greater than 2021-01-01
}
