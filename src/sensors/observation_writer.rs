use tracing::error;

/// Writes a sensor's values into an outgoing observation buffer.
pub struct ObservationWriter<'a> {
    data: &'a mut Vec<f32>,
    shape: Vec<usize>,
    offset: usize,
}

impl<'a> ObservationWriter<'a> {
    pub fn new(data: &'a mut Vec<f32>, shape: &[usize], offset: usize) -> Self {
        ObservationWriter {
            data,
            shape: shape.to_vec(),
            offset,
        }
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn ensure_len(&mut self, len: usize) {
        if self.data.len() < len {
            self.data.resize(len, 0.0);
        }
    }

    pub fn set(&mut self, index: usize, value: f32) {
        let position = self.offset + index;
        self.ensure_len(position + 1);
        self.data[position] = value;
    }

    pub fn add_list(&mut self, values: &[f32], write_offset: usize) {
        let start = self.offset + write_offset;
        self.ensure_len(start + values.len());
        self.data[start..start + values.len()].copy_from_slice(values);
    }

    /// Writes at `(channel, height, width)` of a rank 3 observation.
    pub fn set_3d(&mut self, channel: usize, height: usize, width: usize, value: f32) {
        if self.shape.len() != 3 {
            error!("Cannot index a rank {} observation with three coordinates", self.shape.len());
            return;
        }
        if channel >= self.shape[0] || height >= self.shape[1] || width >= self.shape[2] {
            error!(
                "Position ({}, {}, {}) is outside of observation shape {:?}",
                channel, height, width, self.shape
            );
            return;
        }
        let index = channel * self.shape[1] * self.shape[2] + height * self.shape[2] + width;
        self.set(index, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_writes_are_offset_and_grow_buffer() {
        let mut data = vec![9.0];
        let mut writer = ObservationWriter::new(&mut data, &[3], 1);

        writer.add_list(&[1.0, 2.0], 0);
        writer.set(2, 3.0);

        assert_eq!(data, vec![9.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_set_3d_uses_row_major_layout() {
        let mut data = Vec::new();
        let mut writer = ObservationWriter::new(&mut data, &[2, 2, 3], 0);

        writer.set_3d(1, 1, 2, 5.0);
        writer.set_3d(2, 0, 0, 7.0);

        assert_eq!(data.len(), 12);
        assert_eq!(data[11], 5.0);
    }
}
