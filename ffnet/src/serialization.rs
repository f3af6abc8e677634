use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

use crate::network::Network;

pub fn save_network<P: AsRef<Path>>(path: P, network: &Network) -> bincode::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, network)?;
    writer.flush()?;
    Ok(())
}

pub fn load_network<P: AsRef<Path>>(path: P) -> bincode::Result<Network> {
    let file = File::open(path)?;
    bincode::deserialize_from(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use crate::activation::Activation;
    use crate::matrix::FMatrix;
    use crate::network::Network;
    use rand::SeedableRng;

    #[test]
    fn network_roundtrips_through_bincode() {
        let mut rng = rand_chacha::ChaCha8Rng::seed_from_u64(12);
        let network = Network::new(3, &[4], Activation::Sigmoid, &mut rng).unwrap();

        let bytes = bincode::serialize(&network).unwrap();
        let restored: Network = bincode::deserialize(&bytes).unwrap();

        for (a, b) in network.layers().iter().zip(restored.layers()) {
            assert_eq!(a.weights(), b.weights());
        }

        let batch = FMatrix::from([[0.1, 0.2, 0.3], [-0.4, 0.5, -0.6]]);
        assert_eq!(
            network.predict(&batch).unwrap(),
            restored.predict(&batch).unwrap()
        );
    }
}
