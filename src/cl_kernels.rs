pub const GEMM_KERNELS: &str = r#"
static inline float bf16_to_f32(ushort bits) {
    return as_float(((uint)bits) << 16);
}

// Round-to-nearest-even narrowing, quiet NaNs preserved.
static inline ushort f32_to_bf16(float v) {
    uint bits = as_uint(v);
    if ((bits & 0x7fffffffu) > 0x7f800000u) {
        return (ushort)((bits >> 16) | 0x0040u);
    }
    uint lsb = (bits >> 16) & 1u;
    return (ushort)((bits + 0x7fffu + lsb) >> 16);
}

// INT8 GEMM with fused dequantization epilogue.
//   A: int8, logical M x K, element strides (a_rs, a_cs)
//   B: int8, logical K x N, element strides (b_rs, b_cs)
//   scales: bf16 bits; per-token length M, channel length N
//   Y: bf16 bits, M x N row-major
// One work-item per output cell; each owns its full k loop, ascending,
// so scheduling never changes the reduction order.
__kernel void quant_matmul_bf16(
    __global const char* A,
    __global const char* B,
    __global const ushort* CHANNEL_SCALE,
    __global const ushort* PER_TOKEN_SCALE,
    __global ushort*       Y,
    const int M, const int N, const int K,
    const int a_rs, const int a_cs,
    const int b_rs, const int b_cs
) {
    int row = get_global_id(0);
    int col = get_global_id(1);
    if (row >= M || col >= N) return;

    int acc = 0;
    for (int t = 0; t < K; ++t) {
        int a = (int)A[row*a_rs + t*a_cs];
        int b = (int)B[t*b_rs + col*b_cs];
        acc += a * b;
    }
    // Both scalings at f32 working precision, then one narrowing cast.
    float deq = (float)acc
        * bf16_to_f32(PER_TOKEN_SCALE[row])
        * bf16_to_f32(CHANNEL_SCALE[col]);
    Y[row*N + col] = f32_to_bf16(deq);
}

// Dense f16 GEMM, f32 accumulation, no epilogue.
__kernel void basic_matmul_f16(
    __global const half* A,
    __global const half* B,
    __global half*       Y,
    const int M, const int N, const int K,
    const int a_rs, const int a_cs,
    const int b_rs, const int b_cs
) {
    int row = get_global_id(0);
    int col = get_global_id(1);
    if (row >= M || col >= N) return;

    float acc = 0.0f;
    for (int t = 0; t < K; ++t) {
        acc += vload_half(row*a_rs + t*a_cs, A) * vload_half(t*b_rs + col*b_cs, B);
    }
    vstore_half_rte(acc, row*N + col, Y);
}

// Dense bf16 GEMM, f32 accumulation, no epilogue.
__kernel void basic_matmul_bf16(
    __global const ushort* A,
    __global const ushort* B,
    __global ushort*       Y,
    const int M, const int N, const int K,
    const int a_rs, const int a_cs,
    const int b_rs, const int b_cs
) {
    int row = get_global_id(0);
    int col = get_global_id(1);
    if (row >= M || col >= N) return;

    float acc = 0.0f;
    for (int t = 0; t < K; ++t) {
        acc += bf16_to_f32(A[row*a_rs + t*a_cs]) * bf16_to_f32(B[t*b_rs + col*b_cs]);
    }
    Y[row*N + col] = f32_to_bf16(acc);
}
"#;
