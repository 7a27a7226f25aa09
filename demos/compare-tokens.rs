use anyhow::Result;
use ringwise::cql::CqlValue;
use ringwise::routing::partitioner::{encode_partition_key, PartitionerName};
use ringwise::PartitionKey;

// Prints the tokens every supported partitioner assigns to a few keys.
// They can be compared with `SELECT token(pk) FROM ...` on a real cluster.
fn main() -> Result<()> {
    let partitioners = [
        PartitionerName::Murmur3,
        PartitionerName::Random,
        PartitionerName::CDC,
    ];

    for pk in (0..10_i64).chain(99840..99845_i64) {
        let key = PartitionKey::single(pk);
        for partitioner in &partitioners {
            match partitioner.compute_token(&key)? {
                Some(token) => println!("{:?} token for {}: {}", partitioner, pk, token),
                None => println!("{:?} has no token for {}", partitioner, pk),
            }
        }
    }

    let composite = PartitionKey::new([CqlValue::Int(1), CqlValue::Text("hello".to_owned())])?;
    let encoded = encode_partition_key(&composite)?;
    println!("Composite key (1, 'hello') is hashed as {:02x?}", encoded.as_ref());
    println!(
        "Its Murmur3 token: {:?}",
        PartitionerName::Murmur3.compute_token(&composite)?
    );

    Ok(())
}
